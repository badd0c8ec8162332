//! 宿主门面：连接 ID 分配、连接构造/注册、注册表与 IO 上下文池的所有权。
//!
//! # 教案级注释
//!
//! ## 为什么（Why）
//! 接受循环（谁在监听端口、何时调用 `accept`）被刻意排除在这一层之外：
//! 那是调用方的职责，宿主只负责“给定一个已经连接好的 socket，把它变成
//! 一条受管理的连接”，以及“停机时统一把所有连接带下线”。
//!
//! ## 怎么做（How）
//! `new_connection` 构造 [`crate::connection::Connection`] 并立即调用
//! `register_connection`——这与原流程“套接字存活后连接自行登记进注册
//! 表”一致；`register_connection` 仍然单独公开，留给需要自定义构造路径
//! 的调用方（例如先构造、挂一些自定义的用户态数据，再登记）。

use std::sync::Arc;

use tokio::net::TcpStream;

use spark_core::config::HostConfig;
use spark_core::ids::{ConnectionId, ConnectionIdAllocator};

use crate::connection::Connection;
use crate::hooks::ConnectionHandler;
use crate::io_context::IoContextPool;
use crate::registry::ConnectionRegistry;

/// 单个 TCP 引擎实例的门面：一个宿主拥有一个 ID 分配器、一个注册表、
/// 一个 IO 上下文池，并持有调用方提供的生命周期回调实现。
pub struct Host {
    ids: ConnectionIdAllocator,
    registry: Arc<ConnectionRegistry>,
    pool: Arc<IoContextPool>,
    config: HostConfig,
    hooks: Arc<dyn ConnectionHandler>,
}

impl Host {
    pub fn new(config: HostConfig, hooks: Arc<dyn ConnectionHandler>) -> Self {
        Self {
            ids: ConnectionIdAllocator::new(),
            registry: Arc::new(ConnectionRegistry::new()),
            pool: Arc::new(IoContextPool::new(config.message_buffer_size())),
            config,
            hooks,
        }
    }

    pub fn config(&self) -> HostConfig {
        self.config
    }

    /// 等待自由地分配下一个连接 ID。
    pub fn next_connection_id(&self) -> ConnectionId {
        self.ids.next_id()
    }

    /// 由一个已经建立好的 socket 构造一条连接，并立即注册进宿主。
    ///
    /// 与原设计不同的是这里没有“socket 为空”的失败分支——所有权型的
    /// `TcpStream` 参数本身就排除了空值的可能性，这是 Rust 类型系统
    /// 替我们消除了一整类运行时检查。
    pub fn new_connection(&self, socket: TcpStream) -> Arc<Connection> {
        let id = self.next_connection_id();
        let local_addr = socket.local_addr().ok();
        let peer_addr = socket.peer_addr().ok();
        let send_ctx = self.pool.acquire();
        let recv_ctx = self.pool.acquire();
        let (read_half, write_half) = socket.into_split();

        let connection = Arc::new(Connection::new(
            id,
            local_addr,
            peer_addr,
            read_half,
            write_half,
            send_ctx,
            recv_ctx,
            Arc::clone(&self.pool),
            Arc::clone(&self.registry),
            Arc::clone(&self.hooks),
        ));

        self.register_connection(Arc::clone(&connection));
        connection
    }

    /// 把一条连接登记进注册表并触发 `OnConnected`；若连接已经不活跃
    /// （比如构造后、登记前就被对端断开了），则静默忽略。
    pub fn register_connection(&self, connection: Arc<Connection>) {
        if !connection.is_active() {
            return;
        }
        self.registry.add(Arc::clone(&connection));
        self.hooks.on_connected(&connection);
    }

    pub fn get_connection_by_id(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.registry.get(id)
    }

    pub fn count_connection(&self) -> usize {
        self.registry.count()
    }

    /// 当前 IO 上下文池中空闲的缓冲区数量，供诊断使用。
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// 目前是无操作：接受/监听是外部协作方的职责，不属于这一层。
    pub fn start(&self) {}

    /// 把注册表中的所有连接一次性摘下，为每条连接异步发起断开。不等待
    /// 断开完成——调用方若需要“全部断开完毕”的信号，应自行 `join` 返回
    /// 的任务句柄。
    pub fn stop(&self) -> Vec<tokio::task::JoinHandle<()>> {
        self.registry
            .drain()
            .into_iter()
            .map(|connection| tokio::spawn(async move { connection.begin_disconnect(None).await }))
            .collect()
    }
}
