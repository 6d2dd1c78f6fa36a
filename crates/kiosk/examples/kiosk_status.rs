//! Polls the kiosk status once a second and mirrors reader display updates.
//!
//! ```text
//! cargo run --example kiosk_status -- [HOST]
//! ```

use std::time::Duration;

use kiosk_client::KioskClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let host = std::env::args().nth(1).unwrap_or_default();
    let client = KioskClient::builder().tcp(host).connect()?;

    let mut messages = client.subscribe_reader_messages().await;
    tokio::spawn(async move {
        while let Some(message) = messages.recv().await {
            println!(
                "reader display #{}: {} / {}",
                message.index, message.line1, message.line2
            );
        }
    });

    loop {
        println!("kiosk status: {:?}", client.observed_status().await);
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
