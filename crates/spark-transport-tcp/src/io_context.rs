//! 固定大小 IO 缓冲区及其复用池。
//!
//! # 教案级注释
//!
//! ## 为什么（Why）
//! 每个连接每个方向最多有一笔在途 IO，但连接数可能很大；为每次 `read`/
//! `write` 都分配一块新缓冲区会让分配器成为瓶颈。池化、固定尺寸的缓冲区
//! 把分配频率从“每次 IO 一次”降到“缓冲区首次创建一次”。
//!
//! ## 怎么做（How）
//! [`IoContextPool`] 内部是一个 `parking_lot::Mutex` 保护的空闲栈
//! （LIFO，局部性好）。`acquire` 优先复用，用尽才新建；`release` 在尺寸
//! 不匹配或池已达上限（[`IoContextPool::CAPACITY`]）时直接丢弃，而不是
//! 无限增长。

use parking_lot::Mutex;

/// 池中缓冲区数量上限；超过后归还的上下文被直接丢弃。
const CAPACITY: usize = 50_000;

/// 复用的固定大小字节缓冲区。
///
/// 发送路径和接收路径共用同一个缓冲区类型；当前的发送窗口（还剩多少字节
/// 没发出去）由调用方在 `connection.rs` 的发送循环里用一个局部游标表示，
/// 不是这个结构体自己的字段。
pub struct IoContext {
    buffer: Vec<u8>,
}

impl IoContext {
    fn with_capacity(message_buffer_size: usize) -> Self {
        Self {
            buffer: vec![0u8; message_buffer_size],
        }
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }
}

/// [`IoContext`] 的固定尺寸复用池。
pub struct IoContextPool {
    message_buffer_size: usize,
    free: Mutex<Vec<IoContext>>,
}

impl IoContextPool {
    pub fn new(message_buffer_size: usize) -> Self {
        Self {
            message_buffer_size,
            free: Mutex::new(Vec::new()),
        }
    }

    pub fn message_buffer_size(&self) -> usize {
        self.message_buffer_size
    }

    /// 取出一个上下文：优先复用空闲栈顶，否则新建。
    pub fn acquire(&self) -> IoContext {
        if let Some(ctx) = self.free.lock().pop() {
            ctx
        } else {
            IoContext::with_capacity(self.message_buffer_size)
        }
    }

    /// 归还一个上下文。尺寸不匹配（配置变更遗留）或池已满时直接丢弃。
    pub fn release(&self, ctx: IoContext) {
        if ctx.buffer_len() != self.message_buffer_size {
            return;
        }
        let mut guard = self.free.lock();
        if guard.len() >= CAPACITY {
            return;
        }
        guard.push(ctx);
    }

    /// 当前空闲栈中的上下文数量，供诊断和测试使用。
    pub fn len(&self) -> usize {
        self.free.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
