//! Wire types for the kiosk's JSON-RPC 2.0 surface.
//!
//! Requests are typed values serialized with `serde_json`, so user-supplied
//! strings (display lines, transaction references) can never break out of
//! their JSON field. Each method carries a fixed request id; responses are
//! matched against it by exact equality.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::KioskError;

/// Identifier carried by JSON-RPC requests and echoed by responses.
pub type RequestId = u64;

pub(crate) const METHOD_GET_STATUS: &str = "GetStatus";
pub(crate) const METHOD_SHOW_MESSAGE: &str = "ShowMessage";
pub(crate) const METHOD_GET_KIOSK_ID: &str = "GetKioskID";
pub(crate) const METHOD_GET_VERSION: &str = "GetVersion";
pub(crate) const METHOD_PRE_AUTHORIZE: &str = "PreAuthorize";
pub(crate) const METHOD_PAY_TRANSACTION: &str = "PayTransaction";
pub(crate) const METHOD_CONFIRM_TRANSACTION: &str = "ConfirmTransaction";
pub(crate) const METHOD_VOID_TRANSACTION: &str = "VoidTransaction";
pub(crate) const METHOD_CANCEL_TRANSACTION: &str = "CancelTransaction";

/// Event announcing the outcome of a payment or pre-authorization.
pub(crate) const METHOD_TRANSACTION_COMPLETE: &str = "TransactionComplete";
/// Event carrying a reader display update; reader channel only.
pub(crate) const METHOD_READER_MESSAGE: &str = "ReaderMessageEvent";

pub(crate) const ID_GET_STATUS: RequestId = 1;
pub(crate) const ID_SHOW_MESSAGE: RequestId = 2;
pub(crate) const ID_GET_KIOSK_ID: RequestId = 3;
pub(crate) const ID_GET_KIOSK_VERSION: RequestId = 4;
pub(crate) const ID_GET_READER_VERSION: RequestId = 5;
pub(crate) const ID_PRE_AUTHORIZE: RequestId = 6;
pub(crate) const ID_PAY_TRANSACTION: RequestId = 7;
pub(crate) const ID_CONFIRM_TRANSACTION: RequestId = 8;
pub(crate) const ID_VOID_TRANSACTION: RequestId = 9;
pub(crate) const ID_CANCEL_TRANSACTION: RequestId = 10;

/// Software component selectors for `GetVersion`.
pub(crate) const COMPONENT_KIOSK: &str = "otiKiosk";
pub(crate) const COMPONENT_READER: &str = "Reader";

#[derive(Serialize)]
pub(crate) struct RpcRequest<P> {
    jsonrpc: &'static str,
    method: &'static str,
    params: P,
    pub(crate) id: RequestId,
}

impl<P: Serialize> RpcRequest<P> {
    pub(crate) fn new(method: &'static str, id: RequestId, params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id,
        }
    }
}

/// Acknowledgement returned in-band for events that demand one.
#[derive(Serialize)]
pub(crate) struct EventAck {
    jsonrpc: &'static str,
    result: bool,
    id: RequestId,
}

impl EventAck {
    pub(crate) fn new(id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0",
            result: true,
            id,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct EmptyParams {}

#[derive(Serialize)]
pub(crate) struct ShowMessageParams<'a> {
    #[serde(rename = "strLine1")]
    pub(crate) line1: &'a str,
    #[serde(rename = "strLine2")]
    pub(crate) line2: &'a str,
}

#[derive(Serialize)]
pub(crate) struct VersionParams {
    #[serde(rename = "SoftwareComponent")]
    pub(crate) component: &'static str,
}

#[derive(Serialize)]
pub(crate) struct ConfirmParams<'a> {
    pub(crate) amount: u32,
    pub(crate) fee: u32,
    #[serde(rename = "productID")]
    pub(crate) product_id: u32,
    #[serde(rename = "transaction_Reference")]
    pub(crate) transaction_reference: &'a str,
}

#[derive(Serialize)]
pub(crate) struct VoidParams<'a> {
    #[serde(rename = "transaction_Reference")]
    pub(crate) transaction_reference: &'a str,
}

/// What a payment or pre-authorization should do, in wire units.
///
/// Amounts and fees are integer minor units (e.g. cents); the currency is
/// its numeric ISO 4217 code. `timeout_secs` is ignored by the kiosk for
/// continuous transactions.
#[derive(Clone, Debug, Serialize)]
pub struct PaymentParameters {
    #[serde(rename = "amount")]
    pub amount_cents: u32,
    #[serde(rename = "currency")]
    pub currency_code: u16,
    #[serde(rename = "timeout")]
    pub timeout_secs: u32,
    #[serde(rename = "fee")]
    pub fee_cents: u32,
    #[serde(rename = "productID")]
    pub product_id: u32,
    pub continuous: bool,
}

/// Kiosk state as reported by `GetStatus`, plus the two client-synthesized
/// pseudo-states `NoKiosk` (command transport down) and `Error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KioskStatus {
    Ready,
    PaymentTransaction,
    Update,
    Unconfirmed,
    NotReady,
    NoReader,
    NoTerminalId,
    NoKiosk,
    Error,
}

impl KioskStatus {
    pub(crate) fn from_wire(value: &str) -> Option<Self> {
        match value {
            "Ready" => Some(KioskStatus::Ready),
            "PaymentTransaction" => Some(KioskStatus::PaymentTransaction),
            "Update" => Some(KioskStatus::Update),
            "Unconfirmed" => Some(KioskStatus::Unconfirmed),
            "NotReady" => Some(KioskStatus::NotReady),
            "NoReader" => Some(KioskStatus::NoReader),
            "NoTerminalId" => Some(KioskStatus::NoTerminalId),
            _ => None,
        }
    }
}

/// Final status of a transaction as reported by `TransactionComplete`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransactionStatus {
    Ok,
    Declined,
    Voided,
    Timeout,
    Cancelled,
    Error,
    LocalMifare,
    #[default]
    Undefined,
}

impl TransactionStatus {
    pub(crate) fn from_wire(value: &str) -> Option<Self> {
        match value {
            "OK" => Some(TransactionStatus::Ok),
            "Declined" => Some(TransactionStatus::Declined),
            "Void" => Some(TransactionStatus::Voided),
            "Timeout" => Some(TransactionStatus::Timeout),
            "Cancelled" => Some(TransactionStatus::Cancelled),
            "Error" => Some(TransactionStatus::Error),
            "LocalMifare" => Some(TransactionStatus::LocalMifare),
            _ => None,
        }
    }
}

const ERROR_DESCRIPTION_MAX: usize = 100;
const TRANSACTION_REFERENCE_MAX: usize = 128;
const PARTIAL_PAN_MAX: usize = 20;
const CARD_TYPE_MAX: usize = 32;
const CARD_ID_MAX: usize = 32;
const CARD_TOKEN_MAX: usize = 128;

/// Everything the kiosk reports about a finished transaction.
///
/// Amounts are real numbers in whatever unit the kiosk reports (major
/// currency units in practice, unlike the integer minor units sent in
/// [`PaymentParameters`]).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PaymentOutcome {
    pub status: TransactionStatus,
    pub error_code: i32,
    pub error_description: String,
    pub amount_requested: f64,
    pub amount_authorized: f64,
    pub transaction_reference: String,
    pub partial_pan: String,
    pub card_type: String,
    pub card_id: String,
    pub card_token: String,
}

#[derive(Deserialize)]
struct TransactionCompleteParams {
    status: String,
    #[serde(rename = "errorCode", default)]
    error_code: i32,
    #[serde(rename = "errorDescription", default)]
    error_description: String,
    #[serde(rename = "authorizationDetails", default)]
    authorization: AuthorizationDetails,
}

#[derive(Default, Deserialize)]
struct AuthorizationDetails {
    #[serde(rename = "AmountAuthorized", default)]
    amount_authorized: f64,
    #[serde(rename = "AmountRequested", default)]
    amount_requested: f64,
    // The misspelling is the kiosk's, not ours.
    #[serde(rename = "Transaction_Referance", default)]
    transaction_reference: String,
    #[serde(rename = "PartialPan", default)]
    partial_pan: String,
    #[serde(rename = "CardType", default)]
    card_type: String,
    #[serde(rename = "Card_ID", default)]
    card_id: String,
    #[serde(rename = "CardToken", default)]
    card_token: String,
}

impl PaymentOutcome {
    pub(crate) fn from_event_params(params: Value) -> Result<Self, KioskError> {
        let parsed: TransactionCompleteParams = serde_json::from_value(params)
            .map_err(|err| KioskError::parse(format!("TransactionComplete params: {err}")))?;
        let status = TransactionStatus::from_wire(&parsed.status).ok_or_else(|| {
            KioskError::parse(format!("unsupported transaction status '{}'", parsed.status))
        })?;

        Ok(Self {
            status,
            error_code: parsed.error_code,
            error_description: truncated(parsed.error_description, ERROR_DESCRIPTION_MAX),
            amount_requested: parsed.authorization.amount_requested,
            amount_authorized: parsed.authorization.amount_authorized,
            transaction_reference: truncated(
                parsed.authorization.transaction_reference,
                TRANSACTION_REFERENCE_MAX,
            ),
            partial_pan: truncated(parsed.authorization.partial_pan, PARTIAL_PAN_MAX),
            card_type: truncated(parsed.authorization.card_type, CARD_TYPE_MAX),
            card_id: truncated(parsed.authorization.card_id, CARD_ID_MAX),
            card_token: truncated(parsed.authorization.card_token, CARD_TOKEN_MAX),
        })
    }
}

/// Caps a wire string at the protocol's field width, on a char boundary.
fn truncated(mut value: String, max_bytes: usize) -> String {
    if value.len() > max_bytes {
        let mut end = max_bytes;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        value.truncate(end);
    }
    value
}

/// One line pair shown on the card reader's display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReaderMessage {
    pub index: u8,
    pub line1: String,
    pub line2: String,
}

#[derive(Deserialize)]
struct ReaderMessageParams {
    index: u8,
    #[serde(default)]
    line1: Option<String>,
    #[serde(default)]
    line2: Option<String>,
}

impl ReaderMessage {
    pub(crate) fn from_event_params(params: Value) -> Result<Self, KioskError> {
        let parsed: ReaderMessageParams = serde_json::from_value(params)
            .map_err(|err| KioskError::parse(format!("ReaderMessageEvent params: {err}")))?;
        Ok(Self {
            index: parsed.index,
            line1: parsed.line1.unwrap_or_default(),
            line2: parsed.line2.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorObject {
    pub(crate) code: i64,
    pub(crate) message: String,
}

#[derive(Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// A response to one of our requests, already separated from events.
#[derive(Debug)]
pub(crate) struct RpcResponse {
    pub(crate) id: RequestId,
    pub(crate) result: Option<Value>,
    pub(crate) error: Option<RpcErrorObject>,
}

/// A server-initiated message (carries a `method`).
#[derive(Debug)]
pub(crate) struct ServerEvent {
    pub(crate) method: String,
    pub(crate) id: Option<RequestId>,
    pub(crate) params: Option<Value>,
}

#[derive(Debug)]
pub(crate) enum Incoming {
    Response(RpcResponse),
    Event(ServerEvent),
}

/// Classifies one received frame. A `method` marks a server-initiated
/// event (which may itself carry an id to acknowledge); otherwise a
/// numeric id marks a response.
pub(crate) fn decode_frame(frame: &[u8]) -> Result<Incoming, KioskError> {
    let envelope: RpcEnvelope = serde_json::from_slice(frame)
        .map_err(|err| KioskError::parse(format!("incoming message: {err}")))?;

    if let Some(method) = envelope.method {
        return Ok(Incoming::Event(ServerEvent {
            method,
            id: envelope.id.as_ref().and_then(Value::as_u64),
            params: envelope.params,
        }));
    }

    let id = envelope
        .id
        .as_ref()
        .and_then(Value::as_u64)
        .ok_or_else(|| KioskError::parse("incoming message: missing numeric 'id'"))?;

    Ok(Incoming::Response(RpcResponse {
        id,
        result: envelope.result,
        error: envelope.error,
    }))
}

impl RpcResponse {
    /// Checks a result-as-bool response: `true` is success, `false` or an
    /// `error` object is a rejection.
    pub(crate) fn expect_ok_flag(&self, expected_id: RequestId) -> Result<(), KioskError> {
        self.check_id(expected_id)?;
        if let Some(error) = &self.error {
            tracing::error!(code = error.code, message = %error.message, "kiosk returned an error");
            return Err(KioskError::Rejected);
        }
        match self.result.as_ref().and_then(Value::as_bool) {
            Some(true) => Ok(()),
            Some(false) => Err(KioskError::Rejected),
            None => Err(KioskError::parse("missing or non-boolean 'result' field")),
        }
    }

    /// Extracts a result-as-string response.
    pub(crate) fn expect_string(&self, expected_id: RequestId) -> Result<&str, KioskError> {
        self.check_id(expected_id)?;
        self.result
            .as_ref()
            .and_then(Value::as_str)
            .ok_or_else(|| KioskError::parse("missing or non-string 'result' field"))
    }

    fn check_id(&self, expected_id: RequestId) -> Result<(), KioskError> {
        if self.id != expected_id {
            return Err(KioskError::parse(format!(
                "response id {} (expected {expected_id})",
                self.id
            )));
        }
        Ok(())
    }
}
