//! 操作名常量：为 [`spark_core::error::CoreError`] 的 `operation` 字段提供
//! 本 crate 内稳定、可按维度聚合日志的取值。

pub use spark_core::error::{CoreError, ErrorKind, Result};

/// `BeginSend` 发送路径。
pub const SEND: &str = "tcp.send";
/// `BeginReceive` 接收路径。
pub const RECEIVE: &str = "tcp.receive";
/// `BeginDisconnect` 半关闭阶段。
pub const SHUTDOWN: &str = "tcp.shutdown";
/// 套接字选项配置（如 `SO_LINGER`）。
pub const CONFIGURE: &str = "tcp.configure";
/// 宿主构造期配置校验。
pub const CONFIGURE_HOST: &str = "tcp.configure_host";
