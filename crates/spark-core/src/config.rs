//! 构造期配置：`socketBufferSize` 与 `messageBufferSize`。
//!
//! # 教案级注释
//!
//! ## 契约（What）
//! - 两个尺寸都必须 `>= 1`；`HostConfig::new` 在违反该约束时返回
//!   [`ErrorKind::InvalidArgument`]；
//! - `socket_buffer_size` 仅被宿主存储并转交给协作方用于设置 socket
//!   选项，引擎自身从不读取它；
//! - `message_buffer_size` 决定每个池化 IO 上下文缓冲区的大小，从而决定
//!   单次发送的最大分片粒度。

use crate::error::{CoreError, ErrorKind};

const OPERATION: &str = "configure_host";

/// 宿主构造期配置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostConfig {
    socket_buffer_size: usize,
    message_buffer_size: usize,
}

impl HostConfig {
    /// 校验并构造配置；任一尺寸为 0 都会返回 `InvalidArgument`。
    pub fn new(socket_buffer_size: usize, message_buffer_size: usize) -> Result<Self, CoreError> {
        if socket_buffer_size == 0 || message_buffer_size == 0 {
            return Err(CoreError::new(OPERATION, ErrorKind::InvalidArgument));
        }
        Ok(Self {
            socket_buffer_size,
            message_buffer_size,
        })
    }

    pub fn socket_buffer_size(&self) -> usize {
        self.socket_buffer_size
    }

    pub fn message_buffer_size(&self) -> usize {
        self.message_buffer_size
    }
}

impl Default for HostConfig {
    /// 64 KiB 套接字缓冲、4 KiB 消息缓冲，适合大多数短消息协议。
    fn default() -> Self {
        Self {
            socket_buffer_size: 64 * 1024,
            message_buffer_size: 4 * 1024,
        }
    }
}
