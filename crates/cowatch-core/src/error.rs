//! Error types for the synchronization core.
//!
//! Only connectivity changes and room-lookup failures are meant to reach UI
//! code. Everything else is contained: the session logs it and keeps going.

use cowatch_proto::ProtocolError;
use thiserror::Error;

use crate::supervisor::ConnectionState;

/// Errors raised by the synchronization state machines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Send attempted while the channel is not open.
    ///
    /// The envelope is dropped, never queued or retried.
    #[error("channel not open (state {state:?}): envelope dropped")]
    ChannelClosed {
        /// Connection state at the time of the send
        state: ConnectionState,
    },

    /// Inbound frame could not be decoded. Logged and discarded.
    #[error("discarding frame: {0}")]
    MalformedEnvelope(ProtocolError),

    /// Player command requested before a video is ready.
    #[error("player unavailable: dropped {command}")]
    PlayerUnavailable {
        /// Command that was dropped
        command: &'static str,
    },

    /// Room lookup failed. The room view is not entered.
    #[error("room {room} unreachable: {reason}")]
    RoomUnreachable {
        /// Room that was requested
        room: String,
        /// Underlying failure
        reason: String,
    },

    /// Outbound envelope or channel address could not be built.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl SyncError {
    /// Returns true if the same operation may succeed later.
    ///
    /// A closed channel can reopen and a room service can come back. Malformed
    /// frames and protocol failures never fix themselves.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ChannelClosed { .. } | Self::RoomUnreachable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_errors_are_transient() {
        assert!(SyncError::ChannelClosed { state: ConnectionState::Closed }.is_transient());
        assert!(
            SyncError::RoomUnreachable { room: "7".into(), reason: "timeout".into() }
                .is_transient()
        );
    }

    #[test]
    fn local_failures_are_not_transient() {
        assert!(!SyncError::PlayerUnavailable { command: "play" }.is_transient());
        assert!(
            !SyncError::MalformedEnvelope(ProtocolError::MalformedEnvelope("eof".into()))
                .is_transient()
        );
    }
}
