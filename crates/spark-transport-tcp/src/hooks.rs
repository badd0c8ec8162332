//! 连接生命周期回调面：把“连接发生了什么”交给调用方决定怎么处理。
//!
//! 这是一个对象安全（dyn-compatible）的 capability trait，而不是一组
//! 零散的闭包字段——所有方法都给了只打日志的默认实现，实现者只需要
//! 覆盖自己关心的那几个。`on_message_received` 是唯一一个有返回值的
//! 方法：它既是回调也是粘包续传协议的驱动者（见 [`crate::connection`]
//! 模块文档）。

use spark_core::error::CoreError;

use crate::connection::Connection;
use crate::packet::{Packet, SendStatus};

/// 由宿主持有并在连接生命周期的各个节点上调用。
///
/// 所有方法都是同步的：`on_message_received` 的返回值直接驱动接收循环，
/// 不需要 `async-trait` 也不需要把解析器包装成对象安全的异步闭包。
pub trait ConnectionHandler: Send + Sync + 'static {
    /// 连接已注册进宿主、开始对外可见时调用一次。
    fn on_connected(&self, connection: &Connection) {
        tracing::debug!(
            target: spark_core::observability::TARGET,
            connection_id = %connection.id(),
            "connection registered"
        );
    }

    /// 一个包赢得发送权、即将被写往 socket 之前调用。
    fn on_start_sending(&self, connection: &Connection, packet: &Packet) {
        tracing::trace!(
            target: spark_core::observability::TARGET,
            connection_id = %connection.id(),
            bytes = packet.payload().len(),
            "start sending packet"
        );
    }

    /// 一个包的发送流程结束（无论成功还是失败）时调用一次。
    fn on_send_callback(&self, connection: &Connection, packet: &Packet, status: SendStatus) {
        tracing::trace!(
            target: spark_core::observability::TARGET,
            connection_id = %connection.id(),
            bytes = packet.payload().len(),
            status = ?status,
            "packet send completed"
        );
    }

    /// 收到一段数据后调用，`payload` 可能是一次 socket 读取的原始数据，
    /// 也可能是拼接后的重组缓冲区——调用方不需要关心来源。
    ///
    /// 返回值是“续传长度”：
    /// - `0`：payload 不够一条完整消息，等待更多字节；
    /// - `payload.len()`：payload 恰好是整数条消息，已全部消费；
    /// - 其他值：消费了前缀，剩余部分会被立即、同步地再次传入本方法。
    ///
    /// 默认实现什么都不消费（返回 0），相当于“没有配置解析器”。
    fn on_message_received(&self, connection: &Connection, payload: &[u8]) -> usize {
        let _ = (connection, payload);
        0
    }

    /// 连接进入断开流程时调用一次；`error` 在异常断开时携带原因。
    fn on_disconnected(&self, connection: &Connection, error: Option<&CoreError>) {
        match error {
            Some(err) => tracing::info!(
                target: spark_core::observability::TARGET,
                connection_id = %connection.id(),
                error = %err,
                "connection disconnected with error"
            ),
            None => tracing::info!(
                target: spark_core::observability::TARGET,
                connection_id = %connection.id(),
                "connection disconnected"
            ),
        }
    }

    /// 连接在其生命周期内遇到一个非致命但值得上报的错误时调用。
    fn on_connection_error(&self, connection: &Connection, error: &CoreError) {
        tracing::warn!(
            target: spark_core::observability::TARGET,
            connection_id = %connection.id(),
            error = %error,
            "connection error"
        );
    }
}
