//! Room membership and fan-out.
//!
//! [`RelayRooms`] is the relay's pure core: it is told about connections and
//! frames and answers with the frames to deliver. The server executes the
//! returned [`RelayAction`]s; nothing here touches a socket.
//!
//! # Invariants
//!
//! - A connection belongs to exactly one room for its lifetime
//! - `online_count` counts connections that have sent `join`, not raw
//!   connections
//! - Every broadcast reaches all members of the room, sender included, in
//!   connection id order

use std::collections::{BTreeSet, HashMap};

use cowatch_proto::Envelope;

/// Identifies one accepted connection.
pub type ConnectionId = u64;

/// Frame the server must deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAction {
    /// Send a text frame to one connection
    Send {
        /// Recipient
        connection: ConnectionId,
        /// Encoded envelope
        frame: String,
    },
}

#[derive(Debug)]
struct Member {
    room: String,
    /// Set by `join`. `None` until then.
    username: Option<String>,
}

/// Membership of every live room.
#[derive(Debug, Default)]
pub struct RelayRooms {
    members: HashMap<ConnectionId, Member>,
    rooms: HashMap<String, BTreeSet<ConnectionId>>,
}

impl RelayRooms {
    /// No rooms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection in `room`. The room is created on first use.
    pub fn connect(&mut self, connection: ConnectionId, room: impl Into<String>) {
        let room = room.into();
        tracing::debug!(connection, %room, "member connected");
        self.rooms.entry(room.clone()).or_default().insert(connection);
        self.members.insert(connection, Member { room, username: None });
    }

    /// Handle a text frame from a connection.
    ///
    /// Malformed frames and frames from unknown connections produce nothing.
    pub fn frame(&mut self, connection: ConnectionId, text: &str) -> Vec<RelayAction> {
        let Some(member) = self.members.get_mut(&connection) else {
            tracing::warn!(connection, "frame from unknown connection");
            return Vec::new();
        };

        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(connection, error = %e, "dropping malformed frame");
                return Vec::new();
            },
        };

        let room = member.room.clone();
        match envelope {
            Envelope::Join { username } => {
                tracing::info!(connection, %room, %username, "member joined");
                member.username = Some(username.clone());
                let online_count = self.online_count(&room);
                self.broadcast(&room, &Envelope::UserJoined { username, online_count })
            },
            Envelope::UserJoined { .. } | Envelope::UserLeft { .. } => {
                tracing::debug!(connection, kind = %envelope.kind(), "ignoring client presence frame");
                Vec::new()
            },
            Envelope::ChatMessage { .. }
            | Envelope::VideoAction { .. }
            | Envelope::Seek { .. }
            | Envelope::VideoUrlChanged { .. } => {
                tracing::debug!(connection, %room, kind = %envelope.kind(), "relaying");
                self.broadcast(&room, &envelope)
            },
        }
    }

    /// Remove a connection. Announces `user_left` if it had joined.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Vec<RelayAction> {
        let Some(Member { room, username }) = self.members.remove(&connection) else {
            return Vec::new();
        };

        if let Some(members) = self.rooms.get_mut(&room) {
            members.remove(&connection);
            if members.is_empty() {
                self.rooms.remove(&room);
                tracing::debug!(%room, "room emptied");
            }
        }

        let Some(username) = username else {
            tracing::debug!(connection, %room, "member disconnected before joining");
            return Vec::new();
        };

        tracing::info!(connection, %room, %username, "member left");
        let online_count = self.online_count(&room);
        self.broadcast(&room, &Envelope::UserLeft { username, online_count })
    }

    /// Joined members in `room`.
    pub fn online_count(&self, room: &str) -> u32 {
        let joined = self.rooms.get(room).map_or(0, |members| {
            members
                .iter()
                .filter(|id| self.members.get(*id).is_some_and(|m| m.username.is_some()))
                .count()
        });
        u32::try_from(joined).unwrap_or(u32::MAX)
    }

    /// Connections in `room`, joined or not.
    pub fn connections(&self, room: &str) -> usize {
        self.rooms.get(room).map_or(0, BTreeSet::len)
    }

    /// Total live connections.
    pub fn connection_count(&self) -> usize {
        self.members.len()
    }

    /// Number of rooms with at least one connection.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn broadcast(&self, room: &str, envelope: &Envelope) -> Vec<RelayAction> {
        let frame = match envelope.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(%room, error = %e, "failed to encode broadcast");
                return Vec::new();
            },
        };

        self.rooms
            .get(room)
            .into_iter()
            .flatten()
            .map(|&connection| RelayAction::Send { connection, frame: frame.clone() })
            .collect()
    }
}
