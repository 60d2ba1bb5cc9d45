//! Room channel envelopes.
//!
//! Envelopes are flat JSON objects. The variant is carried in the `type`
//! field and every other field sits next to it:
//!
//! ```text
//! {"type":"video_action","action":"play","username":"alice"}
//! {"type":"user_joined","username":"bob","online_count":3}
//! ```
//!
//! # Invariants
//!
//! - Envelopes carry no sequence number. Ordering is whatever the channel
//!   preserves (FIFO).
//! - Every variant carries a `username`. It is the only identity on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Play or pause, as carried by [`Envelope::VideoAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoAction {
    /// Resume playback
    Play,
    /// Pause playback
    Pause,
}

impl VideoAction {
    /// Action that moves the player into the given playing state.
    pub fn from_playing(is_playing: bool) -> Self {
        if is_playing { Self::Play } else { Self::Pause }
    }

    /// Whether this action leaves the player playing.
    pub fn is_play(self) -> bool {
        matches!(self, Self::Play)
    }
}

impl fmt::Display for VideoAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Play => f.write_str("play"),
            Self::Pause => f.write_str("pause"),
        }
    }
}

/// A single typed message exchanged over a room channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Client announces its presence after the channel opens.
    Join {
        /// Local participant
        username: String,
    },

    /// Chat line. Older clients send the `chat.message` discriminator.
    #[serde(alias = "chat.message")]
    ChatMessage {
        /// Message text
        message: String,
        /// Author
        username: String,
    },

    /// Server notice that a participant joined.
    UserJoined {
        /// Participant who joined
        username: String,
        /// Authoritative number of participants after the join
        online_count: u32,
    },

    /// Server notice that a participant left.
    UserLeft {
        /// Participant who left
        username: String,
        /// Authoritative number of participants after the leave
        online_count: u32,
    },

    /// Play or pause command.
    VideoAction {
        /// Requested transport state
        action: VideoAction,
        /// Originating participant
        username: String,
    },

    /// Seek command.
    Seek {
        /// Target position in seconds
        timestamp: f64,
        /// Originating participant
        username: String,
    },

    /// The room switched to a different video.
    VideoUrlChanged {
        /// New video link
        url: String,
        /// Originating participant
        username: String,
    },
}

/// Discriminator of an [`Envelope`], without its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    /// `join`
    Join,
    /// `chat_message`
    ChatMessage,
    /// `user_joined`
    UserJoined,
    /// `user_left`
    UserLeft,
    /// `video_action`
    VideoAction,
    /// `seek`
    Seek,
    /// `video_url_changed`
    VideoUrlChanged,
}

impl EnvelopeKind {
    /// Wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::ChatMessage => "chat_message",
            Self::UserJoined => "user_joined",
            Self::UserLeft => "user_left",
            Self::VideoAction => "video_action",
            Self::Seek => "seek",
            Self::VideoUrlChanged => "video_url_changed",
        }
    }

    /// Kinds that change shared playback state.
    pub fn is_playback(self) -> bool {
        matches!(self, Self::VideoAction | Self::Seek | Self::VideoUrlChanged)
    }

    /// Kinds handled by the presence and chat relay.
    pub fn is_presence_or_chat(self) -> bool {
        matches!(self, Self::ChatMessage | Self::UserJoined | Self::UserLeft)
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Envelope {
    /// `join` for the given participant.
    pub fn join(username: impl Into<String>) -> Self {
        Self::Join { username: username.into() }
    }

    /// `chat_message` from the given participant.
    pub fn chat(message: impl Into<String>, username: impl Into<String>) -> Self {
        Self::ChatMessage { message: message.into(), username: username.into() }
    }

    /// `video_action` from the given participant.
    pub fn video_action(action: VideoAction, username: impl Into<String>) -> Self {
        Self::VideoAction { action, username: username.into() }
    }

    /// `seek` from the given participant.
    pub fn seek(timestamp: f64, username: impl Into<String>) -> Self {
        Self::Seek { timestamp, username: username.into() }
    }

    /// `video_url_changed` from the given participant.
    pub fn video_url_changed(url: impl Into<String>, username: impl Into<String>) -> Self {
        Self::VideoUrlChanged { url: url.into(), username: username.into() }
    }

    /// Discriminator of this envelope.
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Self::Join { .. } => EnvelopeKind::Join,
            Self::ChatMessage { .. } => EnvelopeKind::ChatMessage,
            Self::UserJoined { .. } => EnvelopeKind::UserJoined,
            Self::UserLeft { .. } => EnvelopeKind::UserLeft,
            Self::VideoAction { .. } => EnvelopeKind::VideoAction,
            Self::Seek { .. } => EnvelopeKind::Seek,
            Self::VideoUrlChanged { .. } => EnvelopeKind::VideoUrlChanged,
        }
    }

    /// Participant named by this envelope.
    pub fn username(&self) -> &str {
        match self {
            Self::Join { username }
            | Self::ChatMessage { username, .. }
            | Self::UserJoined { username, .. }
            | Self::UserLeft { username, .. }
            | Self::VideoAction { username, .. }
            | Self::Seek { username, .. }
            | Self::VideoUrlChanged { username, .. } => username,
        }
    }

    /// Encode as a single JSON text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Decode a JSON text frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MalformedEnvelope` if the text is not JSON, lacks a
    ///   known `type`, or is missing a field required by that type
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_action_wire_format() {
        let text = Envelope::video_action(VideoAction::Play, "alice").encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["type"], "video_action");
        assert_eq!(value["action"], "play");
        assert_eq!(value["username"], "alice");
    }

    #[test]
    fn decodes_presence_from_server() {
        let env =
            Envelope::decode(r#"{"type":"user_joined","username":"bob","online_count":3}"#)
                .unwrap();
        assert_eq!(env, Envelope::UserJoined { username: "bob".into(), online_count: 3 });
        assert_eq!(env.kind(), EnvelopeKind::UserJoined);
    }

    #[test]
    fn decodes_legacy_chat_discriminator() {
        let env =
            Envelope::decode(r#"{"type":"chat.message","message":"hi","username":"carol"}"#)
                .unwrap();
        assert_eq!(env, Envelope::chat("hi", "carol"));
    }

    #[test]
    fn ignores_unknown_extra_fields() {
        let env = Envelope::decode(r#"{"type":"seek","timestamp":12.5,"username":"a","ts":1}"#)
            .unwrap();
        assert_eq!(env, Envelope::seek(12.5, "a"));
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            Envelope::decode("not json"),
            Err(ProtocolError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn rejects_missing_type() {
        assert!(matches!(
            Envelope::decode(r#"{"username":"alice"}"#),
            Err(ProtocolError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(matches!(
            Envelope::decode(r#"{"type":"rewind","username":"alice"}"#),
            Err(ProtocolError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn rejects_missing_field() {
        assert!(matches!(
            Envelope::decode(r#"{"type":"user_left","username":"alice"}"#),
            Err(ProtocolError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn kind_names_match_wire_names() {
        let all = [
            Envelope::join("u"),
            Envelope::chat("m", "u"),
            Envelope::UserJoined { username: "u".into(), online_count: 1 },
            Envelope::UserLeft { username: "u".into(), online_count: 0 },
            Envelope::video_action(VideoAction::Pause, "u"),
            Envelope::seek(1.0, "u"),
            Envelope::video_url_changed("https://youtu.be/dQw4w9WgXcQ", "u"),
        ];

        for env in all {
            let value: serde_json::Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
            assert_eq!(value["type"], env.kind().as_str());
            assert_eq!(env.username(), "u");
        }
    }
}
