//! Relay error types.

use thiserror::Error;

/// Errors that can occur in the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Listener could not be bound. Fatal at startup.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Configured bind address
        address: String,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Socket I/O failed.
    ///
    /// On the listener this may be transient (e.g. file descriptor
    /// exhaustion); on a connection it ends that connection only.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or stream failure on one connection.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Client did not finish the WebSocket handshake in time.
    #[error("handshake not completed within {0:?}")]
    HandshakeTimeout(std::time::Duration),
}

impl RelayError {
    /// Whether the accept loop should keep running after this error.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Bind { .. } => false,
            Self::Io(_) | Self::WebSocket(_) | Self::HandshakeTimeout(_) => true,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RelayError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}
