//! Client error types.

use cowatch_core::SyncError;
use thiserror::Error;

/// Transport failures.
///
/// These never reach the session as errors: the transport task reports them as
/// [`crate::ChannelEventKind::Error`] and the channel counts as closed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// WebSocket handshake failed.
    #[error("failed to open channel to {address}: {reason}")]
    Connect {
        /// Address that was dialled
        address: String,
        /// Underlying failure
        reason: String,
    },

    /// Channel task has already exited.
    #[error("channel closed")]
    Closed,

    /// Read or write on an open channel failed.
    #[error("stream error: {0}")]
    Stream(String),
}

impl TransportError {
    /// Whether reopening the channel may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Stream(_) => true,
            Self::Closed => false,
        }
    }
}

/// Room service failures.
#[derive(Debug, Error)]
pub enum RoomServiceError {
    /// HTTP request failed or the response did not decode.
    #[error("room service request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// No room with this id or code.
    #[error("room {room} not found")]
    NotFound {
        /// Requested id or code
        room: String,
    },

    /// Service base URL is unusable.
    #[error("invalid room service URL {base}: {reason}")]
    InvalidBase {
        /// Configured base URL
        base: String,
        /// Parse failure
        reason: String,
    },
}

/// Errors that end a runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Room view could not be entered.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Frontend driver failed.
    #[error("driver error: {0}")]
    Driver(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RuntimeError {
    /// Wrap a driver error.
    pub fn driver<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Driver(Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_live_channel_failures_are_transient() {
        let refused = TransportError::Connect { address: "ws://x".into(), reason: "refused".into() };
        assert!(refused.is_transient());
        assert!(TransportError::Stream("reset".into()).is_transient());
        assert!(!TransportError::Closed.is_transient());
    }
}
