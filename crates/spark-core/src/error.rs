//! 结构化错误契约：区分编程错误与运行时 IO 错误，贯穿发送/接收/关闭路径。
//!
//! # 教案级注释
//!
//! ## 意图（Why）
//! - 发送、接收、关闭三条路径都需要把“谁失败了、为什么失败”沉淀为可判别的
//!   结构化值，而不是裸 `io::Error`，这样上层 `OnConnectionError`/
//!   `OnSendCallback` 钩子才能据此做分支处理而不必解析字符串；
//! - `operation` 字段记录触发错误的稳定操作名（如 `"send"`、
//!   `"beginReceive"`），便于日志聚合按操作维度统计失败率。
//!
//! ## 契约（What）
//! - [`ErrorKind`] 的取值与 §7 错误处理表格一一对应；
//! - [`CoreError`] 总是携带 `operation` 与 `kind`；仅当错误源自操作系统时
//!   才携带 `source: Some(io::Error)`。

use std::io;

/// 错误类别，对应规范第 7 节的错误表格。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 空指针式的编程错误：空 socket、`readLength` 越界、非正的尺寸配置等。
    InvalidArgument,
    /// 发送完成时操作系统报告的错误。
    SendFailed,
    /// 发送请求提交阶段抛出的异常（对应 `SendAsync` 抛出）。
    SendPostFailed,
    /// 接收完成时操作系统报告的错误。
    ReceiveFailed,
    /// 接收请求提交阶段抛出的异常（对应 `ReceiveAsync` 抛出）。
    ReceivePostFailed,
    /// 对端正常关闭（接收到 0 字节），不是真正的错误，但复用同一通道上报。
    PeerClosed,
    /// 半关闭（shutdown）过程失败。
    ShutdownFailed,
    /// 套接字选项配置失败（如 `SO_LINGER`）。
    ConfigureFailed,
    /// 发送完成回调到达但 `currentlySending` 为空——协议不变量被打破。
    UnknownSendCompletion,
    /// 发送队列已经关闭后仍尝试提交。
    QueueClosed,
}

impl ErrorKind {
    /// 是否代表对端正常关闭（而非异常）。
    pub fn is_peer_closed(self) -> bool {
        matches!(self, ErrorKind::PeerClosed)
    }
}

/// 连接引擎的统一错误类型。
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed: {kind:?}")]
pub struct CoreError {
    operation: &'static str,
    kind: ErrorKind,
    #[source]
    source: Option<io::Error>,
}

impl CoreError {
    /// 构造一个不携带 IO 源的错误（编程错误、协议不变量破坏等）。
    pub fn new(operation: &'static str, kind: ErrorKind) -> Self {
        Self {
            operation,
            kind,
            source: None,
        }
    }

    /// 构造一个包装了操作系统错误的实例。
    pub fn from_io(operation: &'static str, kind: ErrorKind, source: io::Error) -> Self {
        Self {
            operation,
            kind,
            source: Some(source),
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 若错误源自操作系统，返回底层 `io::Error` 的引用。
    pub fn io_source(&self) -> Option<&io::Error> {
        self.source.as_ref()
    }
}

/// 连接引擎中统一使用的 `Result` 别名。
pub type Result<T> = core::result::Result<T, CoreError>;
