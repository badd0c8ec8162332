//! 每连接的串行发送队列：一次只放行一个发送者，其余要么排队，要么背压等待。
//!
//! # 教案级注释
//!
//! ## 为什么（Why）
//! TCP 套接字本身不允许并发写入——两个任务同时 `write` 会把各自的数据
//! 交错写乱。队列把“谁在发”这件事变成一个互斥状态（`is_sending`），
//! 而不是让调用方自己协调。
//!
//! ## 契约（What）
//! - `try_send` 返回三种结果之一：`SendCurr`（你赢得了发送权，自己把包
//!   写出去）、`Enqueued`（已有人在发，包已入队等待）、`Closed`（队列
//!   已关闭，包被原样退回）；
//! - 等待队列容量上限 [`CAPACITY`]；达到上限后 `try_send` 不会返回错误，
//!   而是每隔 [`BACKPRESSURE_DELAY`] 重新尝试一次——这是一种背压，不是
//!   失败；
//! - `try_send_next` 由发送方在发完当前包后调用，取出下一个排队的包；
//!   队列空了就把 `is_sending` 复位，让下一个 `try_send` 调用者成为新的
//!   发送者。

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::packet::Packet;

const CAPACITY: usize = 500;
const BACKPRESSURE_DELAY: Duration = Duration::from_millis(1);

/// `try_send` 的三种结果。
#[derive(Debug, PartialEq, Eq)]
pub enum TrySendOutcome {
    /// 调用方赢得了发送权，必须自己驱动这个包发完。
    SendCurr,
    /// 已有发送者在驱动队列，包已入队。
    Enqueued,
    /// 队列已关闭，包被原样退回。
    Closed,
}

struct QueueState {
    is_sending: bool,
    is_closed: bool,
    waiting: VecDeque<Packet>,
}

/// 每连接持有一个实例；所有方法内部自行处理互斥，调用方无需额外加锁。
pub struct PacketQueue {
    state: Mutex<QueueState>,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                is_sending: false,
                is_closed: false,
                waiting: VecDeque::new(),
            }),
        }
    }

    /// 提交一个包。在队列已满时原地自旋等待（见 [`BACKPRESSURE_DELAY`]），
    /// 而不是立即失败或无限堆积。
    pub async fn try_send(&self, packet: Packet) -> (TrySendOutcome, Option<Packet>) {
        loop {
            let mut guard = self.state.lock().await;
            if guard.is_closed {
                return (TrySendOutcome::Closed, Some(packet));
            }
            if !guard.is_sending {
                guard.is_sending = true;
                return (TrySendOutcome::SendCurr, Some(packet));
            }
            if guard.waiting.len() < CAPACITY {
                guard.waiting.push_back(packet);
                return (TrySendOutcome::Enqueued, None);
            }
            drop(guard);
            tokio::time::sleep(BACKPRESSURE_DELAY).await;
            // packet is untouched above; retry.
        }
    }

    /// 当前发送者发完一个包后调用。有排队的包就交出去继续发，否则把
    /// `is_sending` 复位，让队列回到“无人发送”的状态。
    pub async fn try_send_next(&self) -> Option<Packet> {
        let mut guard = self.state.lock().await;
        match guard.waiting.pop_front() {
            Some(packet) => Some(packet),
            None => {
                guard.is_sending = false;
                None
            }
        }
    }

    /// 关闭队列，返回尚未发出的包（可能为空）。重复调用是无操作
    /// （返回 `None`），调用方据此判断自己是不是第一个触发关闭的人。
    pub async fn close(&self) -> Option<Vec<Packet>> {
        let mut guard = self.state.lock().await;
        if guard.is_closed {
            return None;
        }
        guard.is_closed = true;
        Some(guard.waiting.drain(..).collect())
    }
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::new()
    }
}
