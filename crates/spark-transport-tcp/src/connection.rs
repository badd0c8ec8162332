//! 单个 TCP 连接的状态机：发送、接收、断开三条路径，外加粘包重组。
//!
//! # 教案级注释
//!
//! ## 架构（Architecture）
//! 一条连接在任意时刻最多有一笔在途的 socket 写和一笔在途的 socket
//! 读，二者相互独立（全双工）。写路径的互斥由 [`crate::queue::PacketQueue`]
//! 保证（同一时刻只有一个任务在驱动发送循环）；读路径的互斥由
//! `receiving` 原子标志保证（`BeginReceive` 是幂等的，只有第一次调用会
//! 真正启动后台任务）。断开路径的互斥由 `active` 原子标志保证
//! （`BeginDisconnect` 幂等，只有第一次调用会真正执行清理）。
//!
//! ## 粘包重组（Sticky-packet reassembly）
//! [`crate::hooks::ConnectionHandler::on_message_received`] 把“需要更多
//! 字节 / 消费了整段 / 消费了前缀”编码进返回值。接收循环据此决定：
//! - 返回 0：把当前这一段数据的全部内容写入（必要时新建）重组缓冲区，
//!   然后投递下一次 socket 读；
//! - 返回等于当前段长度：清空重组缓冲区（如果存在），投递下一次读；
//! - 返回介于两者之间：不投递新的读，立即用剩余后缀再次同步调用
//!   `on_message_received`——这就是“粘包”在一次 socket 读里被拆成多条
//!   消息时的处理路径。
//!
//! 只要某次 socket 读完成时重组缓冲区为空，第一次调用传给解析器的切片
//! 就直接借用 IO 上下文自己的缓冲区，不发生拷贝；只有进入“还需要更多
//! 字节”的状态后才会产生一次拷贝，这是协议本身要求的（数据必须跨越多
//! 次读保留下来）。

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use socket2::SockRef;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex as AsyncMutex;

use spark_core::error::{CoreError, ErrorKind};
use spark_core::ids::ConnectionId;

use crate::error as op;
use crate::hooks::ConnectionHandler;
use crate::io_context::{IoContext, IoContextPool};
use crate::packet::{Packet, SendStatus};
use crate::queue::{PacketQueue, TrySendOutcome};
use crate::registry::ConnectionRegistry;

enum ChunkOutcome {
    MoreChunks,
    PacketDone,
    Error(CoreError),
}

/// 一条已建立的 TCP 连接。总是通过 [`crate::host::Host`] 构造，并以
/// `Arc<Connection>` 的形式在各处传递。
pub struct Connection {
    id: ConnectionId,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,

    read_half: AsyncMutex<Option<OwnedReadHalf>>,
    write_half: AsyncMutex<Option<OwnedWriteHalf>>,

    send_ctx: AsyncMutex<Option<IoContext>>,
    recv_ctx: AsyncMutex<Option<IoContext>>,
    reassembly: parking_lot::Mutex<Option<BytesMut>>,

    queue: PacketQueue,
    currently_sending: AsyncMutex<Option<Packet>>,

    active: AtomicBool,
    receiving: AtomicBool,

    user_data: parking_lot::Mutex<Option<Box<dyn std::any::Any + Send + Sync>>>,

    pool: Arc<IoContextPool>,
    registry: Arc<ConnectionRegistry>,
    hooks: Arc<dyn ConnectionHandler>,
}

impl Connection {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: ConnectionId,
        local_addr: Option<SocketAddr>,
        peer_addr: Option<SocketAddr>,
        read_half: OwnedReadHalf,
        write_half: OwnedWriteHalf,
        send_ctx: IoContext,
        recv_ctx: IoContext,
        pool: Arc<IoContextPool>,
        registry: Arc<ConnectionRegistry>,
        hooks: Arc<dyn ConnectionHandler>,
    ) -> Self {
        Self {
            id,
            local_addr,
            peer_addr,
            read_half: AsyncMutex::new(Some(read_half)),
            write_half: AsyncMutex::new(Some(write_half)),
            send_ctx: AsyncMutex::new(Some(send_ctx)),
            recv_ctx: AsyncMutex::new(Some(recv_ctx)),
            reassembly: parking_lot::Mutex::new(None),
            queue: PacketQueue::new(),
            currently_sending: AsyncMutex::new(None),
            active: AtomicBool::new(true),
            receiving: AtomicBool::new(false),
            user_data: parking_lot::Mutex::new(None),
            pool,
            registry,
            hooks,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// 存取调用方私有数据的不透明槽位，替代子类化来扩展连接状态。
    pub fn set_user_data<T: std::any::Any + Send + Sync>(&self, value: T) {
        *self.user_data.lock() = Some(Box::new(value));
    }

    pub fn with_user_data<T: std::any::Any + Send + Sync, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.user_data.lock().as_ref().and_then(|boxed| boxed.downcast_ref::<T>()).map(f)
    }

    // ---------------------------------------------------------------
    // 发送路径
    // ---------------------------------------------------------------

    /// 提交一个包。若队列空闲，当前任务自己驱动发送直到队列再次清空；
    /// 否则包入队，由正在发送的任务稍后捎带发出。
    pub async fn begin_send(&self, packet: Packet) {
        if self.send_ctx.lock().await.is_none() {
            self.fail_packet(packet).await;
            return;
        }

        let (outcome, returned) = self.queue.try_send(packet).await;
        match outcome {
            TrySendOutcome::Closed => {
                self.fail_packet(returned.expect("closed outcome carries the packet back")).await;
            }
            TrySendOutcome::Enqueued => {
                // Someone else already owns the send loop; they'll pick this up
                // via `try_send_next`.
            }
            TrySendOutcome::SendCurr => {
                let packet = returned.expect("send_curr outcome carries the packet back");
                self.drive_send_loop(packet).await;
            }
        }
    }

    async fn fail_packet(&self, mut packet: Packet) {
        packet.reset_progress();
        self.hooks.on_send_callback(self, &packet, SendStatus::Failed);
    }

    async fn drive_send_loop(&self, first_packet: Packet) {
        let mut packet = first_packet;
        loop {
            self.hooks.on_start_sending(self, &packet);
            *self.currently_sending.lock().await = Some(packet);

            loop {
                match self.send_one_chunk().await {
                    ChunkOutcome::MoreChunks => continue,
                    ChunkOutcome::PacketDone => break,
                    ChunkOutcome::Error(err) => {
                        if let Some(failed) = self.currently_sending.lock().await.take() {
                            self.hooks.on_send_callback(self, &failed, SendStatus::Failed);
                        }
                        self.begin_disconnect(Some(err)).await;
                        return;
                    }
                }
            }

            let finished = self
                .currently_sending
                .lock()
                .await
                .take()
                .expect("packet present after its send loop completes");
            self.hooks.on_send_callback(self, &finished, SendStatus::Success);

            match self.queue.try_send_next().await {
                Some(next) => packet = next,
                None => return,
            }
        }
    }

    /// 发送当前包的下一个分片：拷贝 `min(剩余字节, MessageBufferSize)`
    /// 到发送上下文的缓冲区，然后把这个窗口写空——写不完就原地推进窗口
    /// 重试，不回去重新从包里拷贝。
    async fn send_one_chunk(&self) -> ChunkOutcome {
        let chunk_len = {
            let mut ctx_guard = self.send_ctx.lock().await;
            let Some(ctx) = ctx_guard.as_mut() else {
                return ChunkOutcome::Error(CoreError::new(op::SEND, ErrorKind::SendFailed));
            };
            let sending_guard = self.currently_sending.lock().await;
            let packet = sending_guard.as_ref().expect("currently_sending set by caller");
            let remaining = packet.remaining();
            let n = remaining.len().min(ctx.buffer_len());
            ctx.as_mut_slice()[..n].copy_from_slice(&remaining[..n]);
            n
        };

        if chunk_len == 0 {
            return ChunkOutcome::PacketDone;
        }

        let mut offset = 0usize;
        while offset < chunk_len {
            let write_result = {
                let mut ctx_guard = self.send_ctx.lock().await;
                let ctx = ctx_guard.as_mut().expect("send ctx present while sending");
                let mut write_guard = self.write_half.lock().await;
                let Some(write_half) = write_guard.as_mut() else {
                    return ChunkOutcome::Error(CoreError::new(op::SEND, ErrorKind::SendFailed));
                };
                write_half.write(&ctx.as_slice()[offset..chunk_len]).await
            };
            match write_result {
                Ok(0) => {
                    return ChunkOutcome::Error(CoreError::new(op::SEND, ErrorKind::SendFailed));
                }
                Ok(n) => offset += n,
                Err(err) => {
                    return ChunkOutcome::Error(CoreError::from_io(op::SEND, ErrorKind::SendFailed, err));
                }
            }
        }

        let packet_done = {
            let mut sending_guard = self.currently_sending.lock().await;
            let packet = sending_guard.as_mut().expect("currently_sending set by caller");
            packet.advance(chunk_len);
            packet.is_sent()
        };

        if packet_done {
            ChunkOutcome::PacketDone
        } else {
            ChunkOutcome::MoreChunks
        }
    }

    // ---------------------------------------------------------------
    // 接收路径
    // ---------------------------------------------------------------

    /// 幂等地启动接收循环；第二次及以后的调用直接返回，不会启动第二个
    /// 并发读取该 socket 的任务。
    pub fn begin_receive(self: &Arc<Self>) {
        if self
            .receiving
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let connection = Arc::clone(self);
        tokio::spawn(async move {
            connection.receive_loop().await;
        });
    }

    async fn receive_loop(self: Arc<Self>) {
        loop {
            let mut ctx_guard = self.recv_ctx.lock().await;
            let Some(ctx) = ctx_guard.as_mut() else {
                return;
            };

            let mut read_guard = self.read_half.lock().await;
            let Some(read_half) = read_guard.as_mut() else {
                return;
            };

            let outcome = read_half.read(ctx.as_mut_slice()).await;
            drop(read_guard);

            match outcome {
                Err(err) => {
                    drop(ctx_guard);
                    self.begin_disconnect(Some(CoreError::from_io(
                        op::RECEIVE,
                        ErrorKind::ReceiveFailed,
                        err,
                    )))
                    .await;
                    return;
                }
                Ok(0) => {
                    drop(ctx_guard);
                    self.begin_disconnect(None).await;
                    return;
                }
                Ok(n) => {
                    {
                        let ctx_ref = ctx_guard.as_ref().expect("recv ctx present while receiving");
                        let slice = &ctx_ref.as_slice()[..n];
                        self.dispatch_received(slice);
                    }
                    drop(ctx_guard);
                }
            }
        }
    }

    /// 粘包重组与续传驱动。见模块文档。
    fn dispatch_received(&self, ctx_view: &[u8]) {
        let mut reassembly = self.reassembly.lock();
        let had_pending = matches!(reassembly.as_ref(), Some(buf) if !buf.is_empty());
        let owned: Option<Vec<u8>> = if had_pending {
            let buf = reassembly.as_mut().expect("checked above");
            buf.extend_from_slice(ctx_view);
            Some(buf.to_vec())
        } else {
            None
        };
        drop(reassembly);

        let base: &[u8] = owned.as_deref().unwrap_or(ctx_view);
        let mut offset = 0usize;
        loop {
            let slice = &base[offset..];
            let consumed = self.hooks.on_message_received(self, slice);
            debug_assert!(
                consumed <= slice.len(),
                "on_message_received consumed more bytes than it was offered"
            );
            let consumed = consumed.min(slice.len());

            if consumed == slice.len() {
                if let Some(buf) = self.reassembly.lock().as_mut() {
                    buf.clear();
                }
                return;
            }
            if consumed == 0 {
                let message_buffer_size = self.pool.message_buffer_size();
                let mut reassembly = self.reassembly.lock();
                let buf = reassembly.get_or_insert_with(|| BytesMut::with_capacity(message_buffer_size));
                buf.clear();
                buf.extend_from_slice(slice);
                return;
            }
            offset += consumed;
        }
    }

    // ---------------------------------------------------------------
    // 断开路径
    // ---------------------------------------------------------------

    /// 幂等地发起断开：半关闭 socket、通知 `OnDisconnected`、释放资源、
    /// 从注册表摘除。第二次及以后的调用直接返回。
    pub async fn begin_disconnect(&self, error: Option<CoreError>) {
        if self
            .active
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        {
            let write_guard = self.write_half.lock().await;
            if let Some(write_half) = write_guard.as_ref() {
                if let Err(shutdown_err) = shutdown_both(write_half) {
                    tracing::debug!(
                        target: spark_core::observability::TARGET,
                        connection_id = %self.id,
                        error = %shutdown_err,
                        "socket shutdown returned an error, proceeding to close anyway"
                    );
                }
            }
        }

        self.hooks.on_disconnected(self, error.as_ref());
        self.free().await;
    }

    async fn free(&self) {
        if let Some(pending) = self.queue.close().await {
            for mut pkt in pending {
                pkt.reset_progress();
                self.hooks.on_send_callback(self, &pkt, SendStatus::Failed);
            }
        }

        self.write_half.lock().await.take();
        self.read_half.lock().await.take();

        if let Some(ctx) = self.send_ctx.lock().await.take() {
            self.pool.release(ctx);
        }
        if let Some(ctx) = self.recv_ctx.lock().await.take() {
            self.pool.release(ctx);
        }

        self.registry.remove(self.id);
    }
}

fn shutdown_both(write_half: &OwnedWriteHalf) -> std::io::Result<()> {
    let sock_ref = SockRef::from(write_half);
    sock_ref.shutdown(std::net::Shutdown::Both)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use proptest::prelude::*;
    use tokio::net::TcpListener;

    use super::*;
    use crate::io_context::IoContextPool;
    use crate::registry::ConnectionRegistry;

    struct ParserHandler {
        parser: Box<dyn Fn(&[u8]) -> usize + Send + Sync>,
        received: StdMutex<Vec<Vec<u8>>>,
    }

    impl ConnectionHandler for ParserHandler {
        fn on_message_received(&self, _connection: &Connection, payload: &[u8]) -> usize {
            self.received.lock().unwrap().push(payload.to_vec());
            (self.parser)(payload)
        }
    }

    async fn loopback_pair() -> (tokio::net::TcpStream, tokio::net::TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback listener");
        let addr = listener.local_addr().expect("listener local addr");
        let (accept_result, connect_result) = tokio::join!(listener.accept(), tokio::net::TcpStream::connect(addr));
        let (server, _) = accept_result.expect("accept loopback connection");
        let client = connect_result.expect("connect to loopback listener");
        (client, server)
    }

    fn make_connection(
        stream: tokio::net::TcpStream,
        message_buffer_size: usize,
        hooks: Arc<dyn ConnectionHandler>,
    ) -> Arc<Connection> {
        let pool = Arc::new(IoContextPool::new(message_buffer_size));
        let registry = Arc::new(ConnectionRegistry::new());
        let send_ctx = pool.acquire();
        let recv_ctx = pool.acquire();
        let local_addr = stream.local_addr().ok();
        let peer_addr = stream.peer_addr().ok();
        let (read_half, write_half) = stream.into_split();
        Arc::new(Connection::new(
            ConnectionId::from_raw(1),
            local_addr,
            peer_addr,
            read_half,
            write_half,
            send_ctx,
            recv_ctx,
            pool,
            registry,
            hooks,
        ))
    }

    // MessageBufferSize = 8, a single read delivers "ABCDEF" (message
    // "ABCD" plus the prefix of the next message). The parser consumes 4
    // bytes on the first call, then reports "need more" on the synchronous
    // re-fire with the suffix.
    #[tokio::test]
    async fn sticky_packet_resolves_via_synchronous_refire() {
        let (stream, _peer) = loopback_pair().await;
        let handler = Arc::new(ParserHandler {
            parser: Box::new(|slice: &[u8]| if slice.len() >= 6 { 4 } else { 0 }),
            received: StdMutex::new(Vec::new()),
        });
        let connection = make_connection(stream, 8, Arc::clone(&handler) as Arc<dyn ConnectionHandler>);

        connection.dispatch_received(b"ABCDEF");

        let received = handler.received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], b"ABCDEF".to_vec());
        assert_eq!(received[1], b"EF".to_vec());
        drop(received);

        let reassembly = connection.reassembly.lock();
        assert_eq!(reassembly.as_deref(), Some(&b"EF"[..]));
    }

    // MessageBufferSize = 4, peer sends "AB" then "CDEF" across two
    // reads; the parser needs >= 5 bytes before it can consume anything.
    #[tokio::test]
    async fn fragmented_message_spans_two_reads() {
        let (stream, _peer) = loopback_pair().await;
        let handler = Arc::new(ParserHandler {
            parser: Box::new(|slice: &[u8]| if slice.len() >= 5 { slice.len() } else { 0 }),
            received: StdMutex::new(Vec::new()),
        });
        let connection = make_connection(stream, 4, Arc::clone(&handler) as Arc<dyn ConnectionHandler>);

        connection.dispatch_received(b"AB");
        assert_eq!(connection.reassembly.lock().as_deref(), Some(&b"AB"[..]));

        connection.dispatch_received(b"CDEF");
        assert_eq!(connection.reassembly.lock().as_deref(), Some(&b""[..]));

        let received = handler.received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], b"AB".to_vec());
        assert_eq!(received[1], b"ABCDEF".to_vec());
    }

    // For any byte stream partitioned arbitrarily across N "reads" and any
    // parser that consumes a fixed k bytes per invocation once it has
    // enough, the concatenation of everything the parser actually consumed
    // equals the longest k-aligned prefix of the original stream, in order,
    // with nothing lost or duplicated.
    proptest! {
        #[test]
        fn framing_is_lossless_for_arbitrary_partitioning(
            original in proptest::collection::vec(any::<u8>(), 0..200),
            k in 1usize..8,
            chunk_sizes in proptest::collection::vec(1usize..9, 1..40),
        ) {
            let mut chunks = Vec::new();
            let mut idx = 0;
            let mut cursor = chunk_sizes.iter().cycle();
            while idx < original.len() {
                let size = *cursor.next().unwrap();
                let end = (idx + size).min(original.len());
                chunks.push(original[idx..end].to_vec());
                idx = end;
            }

            let accumulated = Arc::new(StdMutex::new(Vec::<u8>::new()));
            let acc_for_parser = Arc::clone(&accumulated);
            let handler = Arc::new(ParserHandler {
                parser: Box::new(move |slice: &[u8]| {
                    if slice.len() >= k {
                        acc_for_parser.lock().unwrap().extend_from_slice(&slice[..k]);
                        k
                    } else {
                        0
                    }
                }),
                received: StdMutex::new(Vec::new()),
            });

            let runtime = tokio::runtime::Runtime::new().expect("build test runtime");
            let connection = runtime.block_on(async {
                let (stream, _peer) = loopback_pair().await;
                make_connection(stream, 16, Arc::clone(&handler) as Arc<dyn ConnectionHandler>)
            });

            for chunk in &chunks {
                connection.dispatch_received(chunk);
            }

            let consumed_len = (original.len() / k) * k;
            prop_assert_eq!(accumulated.lock().unwrap().as_slice(), &original[..consumed_len]);
        }
    }
}
