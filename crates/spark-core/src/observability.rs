//! 可观测性字段命名契约：统一日志字段名，避免各实现各写各的键名。
//!
//! 精简自原框架的 `observability::keys` 生成模块；此处不再由构建脚本生成，
//! 直接维护一组手写常量，供 `spark-transport-tcp` 的 `tracing` 调用点引用。

/// 结构化日志中使用的字段名。
pub mod fields {
    /// 连接标识字段。
    pub const CONNECTION_ID: &str = "connection.id";
    /// 对端地址字段。
    pub const PEER_ADDR: &str = "connection.peer_addr";
    /// 本地地址字段。
    pub const LOCAL_ADDR: &str = "connection.local_addr";
    /// 本次操作涉及的字节数。
    pub const BYTES: &str = "io.bytes";
    /// IO 上下文池当前大小。
    pub const POOL_SIZE: &str = "io_pool.size";
    /// 发送队列当前等待长度。
    pub const QUEUE_DEPTH: &str = "send_queue.depth";
}

/// `tracing` 调用统一使用的 target，便于按子系统过滤日志。
pub const TARGET: &str = "spark_core::transport::tcp";
