//! 待发送数据包：不可变负载 + 可变发送游标。

use bytes::Bytes;

/// `OnSendCallback` 报告的终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Success,
    Failed,
}

/// 一次 `BeginSend` 调用对应的数据包。
///
/// `sent_size` 是发送游标，在分片发送过程中单调递增；队列关闭或连接错误时
/// 会被重置为 0 再交给 `OnSendCallback(Failed)`，这样回调永远看到的是
/// "这个包没发出去"而不是一个暧昧的部分值。
#[derive(Debug, Clone)]
pub struct Packet {
    payload: Bytes,
    sent_size: usize,
}

impl Packet {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            sent_size: 0,
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn sent_size(&self) -> usize {
        self.sent_size
    }

    pub fn is_sent(&self) -> bool {
        self.sent_size >= self.payload.len()
    }

    pub(crate) fn remaining(&self) -> &[u8] {
        &self.payload[self.sent_size..]
    }

    pub(crate) fn advance(&mut self, n: usize) {
        self.sent_size = (self.sent_size + n).min(self.payload.len());
    }

    pub(crate) fn reset_progress(&mut self) {
        self.sent_size = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_sent_immediately() {
        let packet = Packet::new(Bytes::new());
        assert!(packet.is_sent());
        assert_eq!(packet.remaining().len(), 0);
    }

    #[test]
    fn advance_tracks_cursor_and_clamps() {
        let mut packet = Packet::new(Bytes::from_static(b"hello"));
        assert!(!packet.is_sent());
        packet.advance(3);
        assert_eq!(packet.remaining(), b"lo");
        packet.advance(100);
        assert!(packet.is_sent());
    }

    #[test]
    fn reset_progress_clears_cursor() {
        let mut packet = Packet::new(Bytes::from_static(b"hi"));
        packet.advance(2);
        assert!(packet.is_sent());
        packet.reset_progress();
        assert!(!packet.is_sent());
        assert_eq!(packet.sent_size(), 0);
    }
}
