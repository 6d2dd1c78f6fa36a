//! Runs one pre-authorization and settles it: confirm on approval, nothing
//! otherwise (a declined pre-auth reserves no funds).
//!
//! ```text
//! cargo run --example payment_flow -- [HOST] [AMOUNT_CENTS]
//! ```

use kiosk_client::{KioskClient, PaymentParameters, TransactionStatus};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let host = std::env::args().nth(1).unwrap_or_default();
    let amount_cents: u32 = std::env::args()
        .nth(2)
        .map(|arg| arg.parse())
        .transpose()?
        .unwrap_or(100);

    let client = KioskClient::builder().tcp(host).connect()?;
    let mut outcomes = client.subscribe_transactions().await;

    client
        .pre_authorize(&PaymentParameters {
            amount_cents,
            currency_code: 978,
            timeout_secs: 30,
            fee_cents: 0,
            product_id: 0,
            continuous: false,
        })
        .await?;
    println!("pre-authorization accepted, present a card...");

    let outcome = outcomes
        .recv()
        .await
        .ok_or("transaction stream closed before an outcome arrived")?;
    println!(
        "transaction {:?} (ref '{}', authorized {})",
        outcome.status, outcome.transaction_reference, outcome.amount_authorized
    );

    if outcome.status == TransactionStatus::Ok {
        client
            .confirm_transaction(amount_cents, 0, 0, &outcome.transaction_reference)
            .await?;
        println!("confirmed");
    }

    Ok(())
}
