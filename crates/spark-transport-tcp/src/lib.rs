#![doc = r#"
# spark-transport-tcp

## 设计动机（Why）
一个异步 TCP 连接引擎的核心：连接状态机、每连接带背压的发送队列、
粘包重组的接收路径，以及支撑这一切的宿主设施（ID 分配、连接注册表、
IO 上下文池）。接受/监听、握手协商、编解码都被刻意排除在外——那些是
上层协作方的职责，这一层只负责“给定一个已连接的 socket，把它变成一条
生命周期被完整管理的连接”。

## 核心契约（What）
- [`host::Host`]：门面，拥有 ID 分配器、注册表、IO 上下文池，暴露
  `new_connection` / `register_connection` / `stop` 等操作；
- [`connection::Connection`]：单条连接的状态机，`begin_send` /
  `begin_receive` / `begin_disconnect` 三条路径；
- [`queue::PacketQueue`]：每连接串行化的发送队列，容量达到上限后以
  固定延迟自旋重试施加背压，而不是丢包或报错；
- [`io_context::IoContextPool`]：固定大小字节缓冲区的复用池，带硬性
  数量上限；
- [`registry::ConnectionRegistry`]：并发的连接 ID -> 连接映射；
- [`hooks::ConnectionHandler`]：连接生命周期回调面，供调用方注入自己
  的业务逻辑（通常是一个协议解析器 + 监控埋点）。

## 实现策略（How）
基于 Tokio 的 `TcpStream`，读写两端 `into_split()` 成独立的
`OwnedReadHalf` / `OwnedWriteHalf`，从而让一条连接的收发天然全双工；
半关闭通过 `socket2::SockRef` 操作底层文件描述符完成。所有生命周期钩子
都是同步方法（没有引入 `async-trait`），`on_message_received` 的返回
值直接驱动接收循环里的粘包续传状态机。

## 权衡（Trade-offs）
背压策略选择了“固定延迟自旋重试”而不是基于异步信号量/channel 的唤醒，
因为前者能给出一个可测、可断言的延迟下界；代价是队列持续处于饱和状态
时会有轮询开销，但在本引擎的使用场景下（单连接最多 500 个排队包）这点
开销可以忽略。
"#]

mod connection;
mod error;
mod host;
mod hooks;
mod io_context;
mod packet;
mod queue;
mod registry;

pub use connection::Connection;
pub use error::{CoreError, ErrorKind, Result};
pub use host::Host;
pub use hooks::ConnectionHandler;
pub use io_context::IoContextPool;
pub use packet::{Packet, SendStatus};
pub use queue::{PacketQueue, TrySendOutcome};
pub use registry::ConnectionRegistry;

pub use spark_core::config::HostConfig;
pub use spark_core::ids::ConnectionId;
