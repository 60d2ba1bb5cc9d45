//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding, decoding, or addressing envelopes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Inbound text was not a valid envelope.
    ///
    /// Covers non-JSON payloads, a missing or unknown `type`, and missing or
    /// mistyped fields. Callers log and discard the frame.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Envelope could not be serialized.
    #[error("failed to encode envelope: {0}")]
    Encode(String),

    /// Server base address could not be turned into a channel address.
    #[error("invalid channel address {address:?}: {reason}")]
    InvalidAddress {
        /// Address as supplied by the caller
        address: String,
        /// Why it was rejected
        reason: String,
    },
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedEnvelope(err.to_string())
    }
}
