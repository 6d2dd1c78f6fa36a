//! Shared helpers for the fake-kiosk integration tests.
#![allow(dead_code)]

use std::time::Duration;

use kiosk_client::KioskClient;
use serde_json::Value;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    time::sleep,
};

/// Generous ceiling for every await in a test; nothing should ever hit it.
pub const TEST_DEADLINE: Duration = Duration::from_secs(5);

/// Binds a fake kiosk channel on an ephemeral localhost port.
pub async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .expect("bind fake kiosk");
    let port = listener.local_addr().expect("local addr").port();
    (listener, port)
}

/// A client wired to fake kiosk ports over TCP.
pub fn start_client(command_port: u16, reader_port: u16) -> KioskClient {
    KioskClient::builder()
        .tcp("127.0.0.1")
        .command_port(command_port)
        .reader_port(reader_port)
        .connect()
        .expect("start client")
}

/// Reads one JSON message from the kiosk side of a connection.
pub async fn recv_json<S: AsyncRead + Unpin>(stream: &mut S) -> Value {
    let mut buf = [0u8; 1024];
    let received = stream.read(&mut buf).await.expect("read from client");
    assert!(received > 0, "client closed the connection");
    serde_json::from_slice(&buf[..received]).expect("client sent valid JSON")
}

/// Writes one JSON message from the kiosk side of a connection.
pub async fn send_json<S: AsyncWrite + Unpin>(stream: &mut S, value: &Value) {
    stream
        .write_all(value.to_string().as_bytes())
        .await
        .expect("write to client");
}

/// Waits for the command channel to come up after `connect()`.
pub async fn wait_connected(client: &KioskClient) {
    for _ in 0..200 {
        if client.is_connected() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("client did not connect to the fake kiosk in time");
}
