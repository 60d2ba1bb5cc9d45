//! Presence and chat relay.
//!
//! Tracks the chat log and online count for one room view. The server is
//! authoritative for the count: every presence envelope replaces it, the
//! client never increments or decrements on its own.

use cowatch_proto::Envelope;

/// One line in the chat log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    /// Line text
    pub text: String,
    /// Author, or the subject of a system line
    pub username: String,
    /// Line was synthesized from a presence envelope
    pub is_system: bool,
}

/// Chat log and presence count for a room view.
#[derive(Debug, Clone, Default)]
pub struct PresenceRelay {
    log: Vec<ChatLine>,
    online_count: u32,
}

impl PresenceRelay {
    /// Empty relay with a count of zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a chat or presence envelope.
    ///
    /// Returns `true` if the log or count changed. Other envelope kinds are
    /// ignored.
    pub fn apply(&mut self, envelope: &Envelope) -> bool {
        match envelope {
            Envelope::ChatMessage { message, username } => {
                self.log.push(ChatLine {
                    text: message.clone(),
                    username: username.clone(),
                    is_system: false,
                });
                true
            },
            Envelope::UserJoined { username, online_count } => {
                self.system_line(username, "joined");
                self.online_count = *online_count;
                true
            },
            Envelope::UserLeft { username, online_count } => {
                self.system_line(username, "left");
                self.online_count = *online_count;
                true
            },
            Envelope::Join { .. }
            | Envelope::VideoAction { .. }
            | Envelope::Seek { .. }
            | Envelope::VideoUrlChanged { .. } => false,
        }
    }

    /// Chat log in receive order.
    pub fn log(&self) -> &[ChatLine] {
        &self.log
    }

    /// Participants online as last reported by the server.
    pub fn online_count(&self) -> u32 {
        self.online_count
    }

    /// Drop all lines and reset the count.
    pub fn clear(&mut self) {
        self.log.clear();
        self.online_count = 0;
    }

    fn system_line(&mut self, username: &str, verb: &str) {
        self.log.push(ChatLine {
            text: format!("{username} {verb}"),
            username: username.to_string(),
            is_system: true,
        });
    }
}
