#![forbid(unsafe_code)]
//! Async client for driving an EMV payment kiosk over JSON-RPC 2.0.
//!
//! The kiosk exposes two stream sockets (TCP ports 10000/10001, or Unix
//! domain sockets `<base>/socket_cmd` and `<base>/socket_events`): a
//! command channel carrying request/response pairs plus the
//! `TransactionComplete` event, and a reader channel carrying display
//! updates for the card reader. This crate maintains both connections
//! (reconnecting forever on a one-second cadence), correlates each command
//! with its response by numeric id, acknowledges events that demand it, and
//! fans server-initiated events out to typed subscriber streams.
//!
//! At most one command is in flight at a time; concurrent callers are
//! serialized internally. Each command waits up to the configured response
//! timeout (500 ms by default) and reports failures as [`KioskError`]
//! values, never panics. Note that a successful [`KioskClient::pay`] or
//! [`KioskClient::pre_authorize`] only means the kiosk accepted the
//! request; the actual outcome arrives later as a [`PaymentOutcome`] on
//! the transaction stream.
//!
//! ```rust,no_run
//! use kiosk_client::{KioskClient, PaymentParameters};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KioskClient::builder().tcp("192.168.1.50").connect()?;
//! let mut outcomes = client.subscribe_transactions().await;
//!
//! client.pre_authorize(&PaymentParameters {
//!     amount_cents: 450,
//!     currency_code: 978,
//!     timeout_secs: 10,
//!     fee_cents: 0,
//!     product_id: 0,
//!     continuous: false,
//! })
//! .await?;
//!
//! if let Some(outcome) = outcomes.recv().await {
//!     println!("transaction {:?}: {}", outcome.status, outcome.transaction_reference);
//! }
//! # Ok(()) }
//! ```
//!
//! Logging goes through [`tracing`]; the crate installs no subscriber, so
//! the application decides where the diagnostics end up.

mod channel;
mod client;
mod config;
mod correlator;
mod error;
mod events;
mod framing;
mod protocol;
mod transport;

pub use client::KioskClient;
pub use config::{
    Endpoint, KioskClientBuilder, DEFAULT_COMMAND_PORT, DEFAULT_READER_PORT, DEFAULT_SOCKET_DIR,
    DEFAULT_TCP_HOST, SOCKET_DIR_ENV,
};
pub use error::{KioskError, ReturnCode};
pub use events::EventStream;
pub use protocol::{
    KioskStatus, PaymentOutcome, PaymentParameters, ReaderMessage, RequestId, TransactionStatus,
};

#[cfg(test)]
mod tests;
