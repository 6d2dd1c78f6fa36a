use std::{io, time::Duration};

use thiserror::Error;

/// Errors surfaced while talking to the kiosk.
#[derive(Debug, Error)]
pub enum KioskError {
    #[error("kiosk socket is not connected")]
    NotConnected,
    #[error("communication with the kiosk failed: {source}")]
    Comm {
        #[source]
        source: io::Error,
    },
    #[error("no response from the kiosk within {0:?}")]
    Timeout(Duration),
    #[error("failed to parse {context}")]
    Parse { context: String },
    #[error("kiosk rejected the command")]
    Rejected,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to serialize request: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("response channel closed unexpectedly")]
    ChannelClosed,
}

impl KioskError {
    pub(crate) fn parse(context: impl Into<String>) -> Self {
        KioskError::Parse {
            context: context.into(),
        }
    }

    /// Coarse classification of this error, matching the kiosk protocol's
    /// flat return-code space.
    pub fn code(&self) -> ReturnCode {
        match self {
            KioskError::NotConnected | KioskError::Comm { .. } | KioskError::Timeout(_) => {
                ReturnCode::CommError
            }
            KioskError::Parse { .. } => ReturnCode::ParsingError,
            KioskError::Rejected => ReturnCode::NegativeResponse,
            KioskError::Config(_) | KioskError::Serialization(_) | KioskError::ChannelClosed => {
                ReturnCode::GeneralError
            }
        }
    }
}

/// Flat result codes as reported by the wire protocol's C predecessors.
///
/// `MemoryError` is part of the historical code space but is never produced
/// here; request building cannot fail allocation-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    Ok,
    GeneralError,
    MemoryError,
    ParsingError,
    CommError,
    NegativeResponse,
}
