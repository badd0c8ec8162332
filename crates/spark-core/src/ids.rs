//! 连接标识分配：等价于宿主侧 `NextConnectionID()`。
//!
//! # 教案级注释
//!
//! ## 意图（Why）
//! - 连接 ID 需要在一个宿主的生命周期内严格递增且互不重复，调用方（通常是
//!   接受循环所在的多个任务）可能并发地创建连接，因此分配必须是等待自由
//!   （wait-free）的，不能引入锁；
//! - 起始值定为 1000，留出低位区间给调用方自定义的保留标识（如健康检查
//!   探针连接）。
//!
//! ## 实现（How）
//! - 底层用 `AtomicI64::fetch_add`，单条原子指令即可完成分配，不存在临界区。

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// 连接标识。在一个宿主的生命周期内唯一且严格递增。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(i64);

impl ConnectionId {
    /// 仅供测试/诊断使用：以裸 `i64` 构造一个标识。
    #[doc(hidden)]
    pub const fn from_raw(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// 等待自由的连接 ID 分配器。
#[derive(Debug)]
pub struct ConnectionIdAllocator {
    next: AtomicI64,
}

impl ConnectionIdAllocator {
    /// 分配器的起始计数值；第一次分配得到的 ID 严格大于该值。
    pub const START: i64 = 1000;

    pub fn new() -> Self {
        Self {
            next: AtomicI64::new(Self::START),
        }
    }

    /// 分配下一个连接 ID。多线程并发调用是安全的，且不会产生重复值。
    pub fn next_id(&self) -> ConnectionId {
        let previous = self.next.fetch_add(1, Ordering::Relaxed);
        ConnectionId(previous + 1)
    }
}

impl Default for ConnectionIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
