//! End-to-end scenarios driven through the public `Host`/`Connection` API
//! over real loopback sockets.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

use spark_transport_tcp::{Connection, ConnectionHandler, CoreError, Host, HostConfig, Packet, SendStatus};

#[derive(Default)]
struct RecordingHandler {
    connected: Mutex<usize>,
    send_callbacks: Mutex<Vec<(usize, usize, SendStatus)>>,
    disconnected: Mutex<usize>,
}

impl ConnectionHandler for RecordingHandler {
    fn on_connected(&self, _connection: &Connection) {
        *self.connected.lock().unwrap() += 1;
    }

    fn on_send_callback(&self, _connection: &Connection, packet: &Packet, status: SendStatus) {
        self.send_callbacks
            .lock()
            .unwrap()
            .push((packet.payload().len(), packet.sent_size(), status));
    }

    fn on_disconnected(&self, _connection: &Connection, _error: Option<&CoreError>) {
        *self.disconnected.lock().unwrap() += 1;
    }
}

async fn loopback_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener local addr");
    let (accept_result, connect_result) = tokio::join!(listener.accept(), TcpStream::connect(addr));
    let (server, _) = accept_result.expect("accept loopback connection");
    let client = connect_result.expect("connect to loopback listener");
    (client, server)
}

// A single packet smaller than the message buffer is delivered whole
// and reported as a single successful send.
#[tokio::test]
async fn single_small_packet_is_delivered_whole() {
    let (mut client, server) = loopback_pair().await;
    let handler = Arc::new(RecordingHandler::default());
    let host = Host::new(HostConfig::default(), Arc::clone(&handler) as Arc<dyn ConnectionHandler>);
    let connection = host.new_connection(server);
    connection.begin_receive();

    connection.begin_send(Packet::new(b"hello".to_vec())).await;

    let mut buf = [0u8; 5];
    tokio::time::timeout(Duration::from_secs(2), client.read_exact(&mut buf))
        .await
        .expect("timed out waiting for bytes")
        .expect("read_exact failed");
    assert_eq!(&buf, b"hello");

    let callbacks = handler.send_callbacks.lock().unwrap();
    assert_eq!(*callbacks, vec![(5, 5, SendStatus::Success)]);
}

// A packet larger than the configured message buffer is sent across
// several internal chunks but still reported as one successful send, with
// every byte eventually observed by the peer.
#[tokio::test]
async fn packet_larger_than_buffer_arrives_in_full() {
    let (mut client, server) = loopback_pair().await;
    let handler = Arc::new(RecordingHandler::default());
    let config = HostConfig::new(64 * 1024, 16).expect("valid config");
    let host = Host::new(config, Arc::clone(&handler) as Arc<dyn ConnectionHandler>);
    let connection = host.new_connection(server);
    connection.begin_receive();

    let payload: Vec<u8> = (0..500u32).map(|i| (i % 256) as u8).collect();
    connection.begin_send(Packet::new(payload.clone())).await;

    let mut received = vec![0u8; payload.len()];
    tokio::time::timeout(Duration::from_secs(2), client.read_exact(&mut received))
        .await
        .expect("timed out waiting for bytes")
        .expect("read_exact failed");
    assert_eq!(received, payload);

    let callbacks = handler.send_callbacks.lock().unwrap();
    assert_eq!(*callbacks, vec![(payload.len(), payload.len(), SendStatus::Success)]);
}

// Disconnecting while packets are still queued drains the backlog,
// reporting each undelivered packet as Failed with its progress reset to
// zero, and fires OnDisconnected exactly once.
#[tokio::test]
async fn disconnect_drains_queued_packets() {
    let (client, server) = loopback_pair().await;
    let handler = Arc::new(RecordingHandler::default());
    let host = Host::new(HostConfig::default(), Arc::clone(&handler) as Arc<dyn ConnectionHandler>);
    let connection = host.new_connection(server);

    // Nobody reads from `client`, so the accepted side's OS send buffer
    // will eventually back up; we don't rely on that here and instead just
    // queue many packets behind a first one that's still in flight.
    let mut handles = Vec::new();
    for i in 0..20u8 {
        let connection = Arc::clone(&connection);
        handles.push(tokio::spawn(async move {
            connection.begin_send(Packet::new(vec![i; 64])).await;
        }));
    }

    connection.begin_disconnect(None).await;
    for handle in handles {
        let _ = handle.await;
    }
    drop(client);

    assert_eq!(*handler.disconnected.lock().unwrap(), 1);
    let callbacks = handler.send_callbacks.lock().unwrap();
    assert!(!callbacks.is_empty());
    for (_, sent_size, status) in callbacks.iter() {
        if *status == SendStatus::Failed {
            assert_eq!(*sent_size, 0);
        }
    }

    // A second disconnect is a no-op.
    connection.begin_disconnect(None).await;
    assert_eq!(*handler.disconnected.lock().unwrap(), 1);
}

// Once the per-connection backlog is saturated, submitting further
// packets does not panic, deadlock, or drop work — everything queued
// eventually reaches a terminal callback.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overflowing_the_backlog_still_resolves_every_packet() {
    let (mut client, server) = loopback_pair().await;
    let handler = Arc::new(RecordingHandler::default());
    let host = Host::new(HostConfig::default(), Arc::clone(&handler) as Arc<dyn ConnectionHandler>);
    let connection = host.new_connection(server);

    let drain = tokio::spawn(async move {
        let mut sink = [0u8; 4096];
        loop {
            match client.read(&mut sink).await {
                Ok(0) | Err(_) => return,
                Ok(_) => continue,
            }
        }
    });

    let total = 600usize;
    let mut handles = Vec::with_capacity(total);
    for i in 0..total {
        let connection = Arc::clone(&connection);
        handles.push(tokio::spawn(async move {
            connection.begin_send(Packet::new(vec![(i % 256) as u8; 32])).await;
        }));
    }
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("packet send task hung")
            .expect("packet send task panicked");
    }

    let callbacks = handler.send_callbacks.lock().unwrap();
    assert_eq!(callbacks.len(), total);
    assert!(callbacks.iter().all(|(_, _, status)| *status == SendStatus::Success));
    drop(callbacks);

    connection.begin_disconnect(None).await;
    let _ = drain.await;
}
