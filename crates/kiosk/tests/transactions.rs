//! Payment flows: command acceptance, completion events, acknowledgements.

mod support;

use kiosk_client::{KioskError, PaymentParameters, TransactionStatus};
use serde_json::json;
use tokio::time::timeout;

use support::{bind, recv_json, send_json, start_client, wait_connected, TEST_DEADLINE};

fn demo_payment() -> PaymentParameters {
    PaymentParameters {
        amount_cents: 450,
        currency_code: 978,
        timeout_secs: 10,
        fee_cents: 0,
        product_id: 0,
        continuous: false,
    }
}

#[tokio::test]
async fn pre_authorize_then_transaction_complete() {
    let (commands, command_port) = bind().await;
    let (_reader, reader_port) = bind().await;
    let client = start_client(command_port, reader_port);

    let (mut conn, _) = timeout(TEST_DEADLINE, commands.accept())
        .await
        .expect("accept deadline")
        .expect("accept");
    wait_connected(&client).await;
    let mut outcomes = client.subscribe_transactions().await;

    let server = async {
        let request = recv_json(&mut conn).await;
        assert_eq!(request["method"], "PreAuthorize");
        assert_eq!(request["id"], 6);
        assert_eq!(
            request["params"],
            json!({
                "amount": 450,
                "currency": 978,
                "timeout": 10,
                "fee": 0,
                "productID": 0,
                "continuous": false
            })
        );
        send_json(&mut conn, &json!({"jsonrpc": "2.0", "result": true, "id": 6})).await;

        // The reader finishes the transaction a moment later.
        send_json(
            &mut conn,
            &json!({
                "jsonrpc": "2.0",
                "method": "TransactionComplete",
                "params": {
                    "status": "OK",
                    "authorizationDetails": {
                        "Transaction_Referance": "TX1",
                        "AmountAuthorized": 4.5,
                        "AmountRequested": 4.5
                    }
                },
                "id": 99
            }),
        )
        .await;

        // The client must acknowledge the event with the event's own id.
        let ack = recv_json(&mut conn).await;
        assert_eq!(
            ack,
            json!({"jsonrpc": "2.0", "result": true, "id": 99})
        );
    };

    let client_side = async {
        client
            .pre_authorize(&demo_payment())
            .await
            .expect("pre-authorize accepted");
        let outcome = outcomes.recv().await.expect("outcome delivered");
        assert_eq!(outcome.status, TransactionStatus::Ok);
        assert_eq!(outcome.transaction_reference, "TX1");
        assert_eq!(outcome.amount_authorized, 4.5);
        assert_eq!(outcome.amount_requested, 4.5);
    };

    timeout(TEST_DEADLINE, async { tokio::join!(server, client_side) })
        .await
        .expect("deadline");
}

#[tokio::test]
async fn pay_uses_its_own_request_id() {
    let (commands, command_port) = bind().await;
    let (_reader, reader_port) = bind().await;
    let client = start_client(command_port, reader_port);

    let (mut conn, _) = timeout(TEST_DEADLINE, commands.accept())
        .await
        .expect("accept deadline")
        .expect("accept");
    wait_connected(&client).await;

    let server = async {
        let request = recv_json(&mut conn).await;
        assert_eq!(request["method"], "PayTransaction");
        assert_eq!(request["id"], 7);
        send_json(&mut conn, &json!({"jsonrpc": "2.0", "result": true, "id": 7})).await;
    };
    let payment = demo_payment();
    let (result, ()) = tokio::join!(client.pay(&payment), server);
    result.expect("payment accepted");
}

#[tokio::test]
async fn confirm_and_void_round_trips() {
    let (commands, command_port) = bind().await;
    let (_reader, reader_port) = bind().await;
    let client = start_client(command_port, reader_port);

    let (mut conn, _) = timeout(TEST_DEADLINE, commands.accept())
        .await
        .expect("accept deadline")
        .expect("accept");
    wait_connected(&client).await;

    let server = async {
        let request = recv_json(&mut conn).await;
        assert_eq!(request["method"], "ConfirmTransaction");
        assert_eq!(request["id"], 8);
        assert_eq!(
            request["params"],
            json!({
                "amount": 450,
                "fee": 0,
                "productID": 0,
                "transaction_Reference": "TX1"
            })
        );
        send_json(&mut conn, &json!({"jsonrpc": "2.0", "result": true, "id": 8})).await;

        let request = recv_json(&mut conn).await;
        assert_eq!(request["method"], "VoidTransaction");
        assert_eq!(request["id"], 9);
        assert_eq!(request["params"], json!({"transaction_Reference": "TX2"}));
        send_json(&mut conn, &json!({"jsonrpc": "2.0", "result": false, "id": 9})).await;
    };

    let client_side = async {
        client
            .confirm_transaction(450, 0, 0, "TX1")
            .await
            .expect("confirm accepted");
        let err = client
            .void_transaction("TX2")
            .await
            .expect_err("void rejected");
        assert!(matches!(err, KioskError::Rejected));
    };

    timeout(TEST_DEADLINE, async { tokio::join!(server, client_side) })
        .await
        .expect("deadline");
}

#[tokio::test]
async fn malformed_completion_event_is_dropped_without_breaking_the_stream() {
    let (commands, command_port) = bind().await;
    let (_reader, reader_port) = bind().await;
    let client = start_client(command_port, reader_port);

    let (mut conn, _) = timeout(TEST_DEADLINE, commands.accept())
        .await
        .expect("accept deadline")
        .expect("accept");
    wait_connected(&client).await;
    let mut outcomes = client.subscribe_transactions().await;

    // Unknown transaction status: parse error, event dropped, no ACK owed.
    send_json(
        &mut conn,
        &json!({
            "jsonrpc": "2.0",
            "method": "TransactionComplete",
            "params": {"status": "Exploded"},
            "id": 41
        }),
    )
    .await;

    // An unrelated method on the command channel is dropped too.
    send_json(
        &mut conn,
        &json!({
            "jsonrpc": "2.0",
            "method": "SomethingNew",
            "params": {},
            "id": 42
        }),
    )
    .await;

    // A well-formed event after the bad ones still gets through.
    send_json(
        &mut conn,
        &json!({
            "jsonrpc": "2.0",
            "method": "TransactionComplete",
            "params": {"status": "Cancelled"},
            "id": 43
        }),
    )
    .await;

    let outcome = timeout(TEST_DEADLINE, outcomes.recv())
        .await
        .expect("deadline")
        .expect("outcome");
    assert_eq!(outcome.status, TransactionStatus::Cancelled);
    assert!(outcomes.try_recv().is_err(), "only one event may surface");

    // Only the valid event was acknowledged.
    let ack = timeout(TEST_DEADLINE, recv_json(&mut conn))
        .await
        .expect("deadline");
    assert_eq!(ack, json!({"jsonrpc": "2.0", "result": true, "id": 43}));
}

#[tokio::test]
async fn every_subscriber_sees_each_outcome() {
    let (commands, command_port) = bind().await;
    let (_reader, reader_port) = bind().await;
    let client = start_client(command_port, reader_port);

    let (mut conn, _) = timeout(TEST_DEADLINE, commands.accept())
        .await
        .expect("accept deadline")
        .expect("accept");
    wait_connected(&client).await;

    let mut first = client.subscribe_transactions().await;
    let mut second = client.subscribe_transactions().await;

    send_json(
        &mut conn,
        &json!({
            "jsonrpc": "2.0",
            "method": "TransactionComplete",
            "params": {"status": "OK"},
            "id": 60
        }),
    )
    .await;

    for stream in [&mut first, &mut second] {
        let outcome = timeout(TEST_DEADLINE, stream.recv())
            .await
            .expect("deadline")
            .expect("outcome");
        assert_eq!(outcome.status, TransactionStatus::Ok);
    }
}

#[tokio::test]
async fn completion_may_outrun_the_command_response() {
    // The kiosk is free to emit TransactionComplete before it answers the
    // command that started the transaction.
    let (commands, command_port) = bind().await;
    let (_reader, reader_port) = bind().await;
    let client = start_client(command_port, reader_port);

    let (mut conn, _) = timeout(TEST_DEADLINE, commands.accept())
        .await
        .expect("accept deadline")
        .expect("accept");
    wait_connected(&client).await;
    let mut outcomes = client.subscribe_transactions().await;

    let server = async {
        let request = recv_json(&mut conn).await;
        assert_eq!(request["method"], "PayTransaction");
        send_json(
            &mut conn,
            &json!({
                "jsonrpc": "2.0",
                "method": "TransactionComplete",
                "params": {"status": "Declined", "errorCode": 5},
                "id": 70
            }),
        )
        .await;
        send_json(&mut conn, &json!({"jsonrpc": "2.0", "result": true, "id": 7})).await;
    };

    let client_side = async {
        client.pay(&demo_payment()).await.expect("pay accepted");
        let outcome = outcomes.recv().await.expect("outcome");
        assert_eq!(outcome.status, TransactionStatus::Declined);
        assert_eq!(outcome.error_code, 5);
    };

    timeout(TEST_DEADLINE, async { tokio::join!(server, client_side) })
        .await
        .expect("deadline");
}

#[tokio::test]
async fn rejected_pre_authorize_reports_negative_response() {
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
        send_json(&mut conn, &json!({"jsonrpc": "2.0", "result": false, "id": 6})).await;
    };
    let payment = demo_payment();
    let (result, ()) = tokio::join!(client.pre_authorize(&payment), server);
    assert!(matches!(result, Err(KioskError::Rejected)));
}
