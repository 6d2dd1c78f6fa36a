//! End-to-end flows over Unix domain sockets.

mod support;

use kiosk_client::{KioskClient, KioskStatus, TransactionStatus};
use serde_json::json;
use tokio::{net::UnixListener, time::timeout};

use support::{recv_json, send_json, wait_connected, TEST_DEADLINE};

#[tokio::test]
async fn both_channels_work_over_unix_sockets() {
    let dir = tempfile::tempdir().expect("tempdir");
    let commands = UnixListener::bind(dir.path().join("socket_cmd")).expect("bind cmd socket");
    let reader = UnixListener::bind(dir.path().join("socket_events")).expect("bind event socket");

    let client = KioskClient::builder()
        .unix(dir.path())
        .connect()
        .expect("start client");

    let (mut cmd_conn, _) = timeout(TEST_DEADLINE, commands.accept())
        .await
        .expect("accept deadline")
        .expect("accept");
    let (mut reader_conn, _) = timeout(TEST_DEADLINE, reader.accept())
        .await
        .expect("accept deadline")
        .expect("accept");
    wait_connected(&client).await;

    let mut outcomes = client.subscribe_transactions().await;
    let mut messages = client.subscribe_reader_messages().await;

    // Command round trip.
    let server = async {
        let request = recv_json(&mut cmd_conn).await;
        assert_eq!(request["method"], "GetStatus");
        send_json(
            &mut cmd_conn,
            &json!({"jsonrpc": "2.0", "result": "Ready", "id": 1}),
        )
        .await;
    };
    let (status, ()) = tokio::join!(client.get_status(), server);
    assert_eq!(status.expect("status"), KioskStatus::Ready);

    // Events on both channels.
    send_json(
        &mut cmd_conn,
        &json!({
            "jsonrpc": "2.0",
            "method": "TransactionComplete",
            "params": {"status": "OK"},
            "id": 90
        }),
    )
    .await;
    send_json(
        &mut reader_conn,
        &json!({
            "jsonrpc": "2.0",
            "method": "ReaderMessageEvent",
            "params": {"index": 1, "line1": "Hello"}
        }),
    )
    .await;

    let outcome = timeout(TEST_DEADLINE, outcomes.recv())
        .await
        .expect("deadline")
        .expect("outcome");
    assert_eq!(outcome.status, TransactionStatus::Ok);

    let message = timeout(TEST_DEADLINE, messages.recv())
        .await
        .expect("deadline")
        .expect("message");
    assert_eq!(message.index, 1);
    assert_eq!(message.line1, "Hello");

    let ack = timeout(TEST_DEADLINE, recv_json(&mut cmd_conn))
        .await
        .expect("deadline");
    assert_eq!(ack, json!({"jsonrpc": "2.0", "result": true, "id": 90}));
}
