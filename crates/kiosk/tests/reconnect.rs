//! Link-failure behavior: disconnected status, timeouts, reconnects.

mod support;

use std::time::Duration;

use kiosk_client::{KioskClient, KioskStatus, ReturnCode};
use serde_json::json;
use tokio::time::timeout;

use support::{bind, recv_json, send_json, start_client, wait_connected, TEST_DEADLINE};

#[tokio::test]
async fn commands_fail_fast_while_the_kiosk_is_unreachable() {
    // Grab a port with no listener behind it.
    let (commands, command_port) = bind().await;
    let (_reader, reader_port) = bind().await;
    drop(commands);

    let client = start_client(command_port, reader_port);

    let err = timeout(TEST_DEADLINE, client.get_status())
        .await
        .expect("deadline")
        .expect_err("no kiosk to talk to");
    assert_eq!(err.code(), ReturnCode::CommError);

    assert_eq!(client.observed_status().await, KioskStatus::NoKiosk);
}

#[tokio::test]
async fn client_reconnects_after_the_kiosk_drops_the_link() {
    let (commands, command_port) = bind().await;
    let (_reader, reader_port) = bind().await;
    let client = KioskClient::builder()
        .tcp("127.0.0.1")
        .command_port(command_port)
        .reader_port(reader_port)
        .response_timeout(Duration::from_millis(200))
        .connect()
        .expect("start client");

    // First connection serves one status query.
    let (mut conn, _) = timeout(TEST_DEADLINE, commands.accept())
        .await
        .expect("accept deadline")
        .expect("accept");
    wait_connected(&client).await;

    let server = async {
        let _ = recv_json(&mut conn).await;
        send_json(&mut conn, &json!({"jsonrpc": "2.0", "result": "Ready", "id": 1})).await;
    };
    let (status, ()) = tokio::join!(client.get_status(), server);
    assert_eq!(status.expect("status"), KioskStatus::Ready);

    // The kiosk goes away; the worker must dial back in on its own.
    drop(conn);
    let (mut conn, _) = timeout(TEST_DEADLINE, commands.accept())
        .await
        .expect("reconnect deadline")
        .expect("accept");
    wait_connected(&client).await;

    let server = async {
        let _ = recv_json(&mut conn).await;
        send_json(
            &mut conn,
            &json!({"jsonrpc": "2.0", "result": "NotReady", "id": 1}),
        )
        .await;
    };
    let (status, ()) = tokio::join!(client.get_status(), server);
    assert_eq!(status.expect("status after reconnect"), KioskStatus::NotReady);
}

#[tokio::test]
async fn observed_status_tracks_the_link_state() {
    let (commands, command_port) = bind().await;
    let (_reader, reader_port) = bind().await;
    let client = start_client(command_port, reader_port);

    let (mut conn, _) = timeout(TEST_DEADLINE, commands.accept())
        .await
        .expect("accept deadline")
        .expect("accept");
    wait_connected(&client).await;

    let server = async {
        let _ = recv_json(&mut conn).await;
        send_json(&mut conn, &json!({"jsonrpc": "2.0", "result": "Ready", "id": 1})).await;
    };
    let (status, ()) = tokio::join!(client.observed_status(), server);
    assert_eq!(status, KioskStatus::Ready);

    // Parse trouble is surfaced as the Error pseudo-state.
    let server = async {
        let _ = recv_json(&mut conn).await;
        send_json(&mut conn, &json!({"jsonrpc": "2.0", "result": "Weird", "id": 1})).await;
    };
    let (status, ()) = tokio::join!(client.observed_status(), server);
    assert_eq!(status, KioskStatus::Error);
}
