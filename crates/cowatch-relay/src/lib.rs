//! Cowatch relay server
//!
//! Broadcast server for room channels. Every client in a room receives every
//! playback and chat envelope, its own included, plus presence
//! announcements generated by the relay.
//!
//! # Components
//!
//! - [`RelayRooms`]: membership and fan-out (pure logic, no I/O)
//! - [`RelayServer`]: WebSocket runtime that executes `RelayRooms` actions
//! - [`RelayConfig`]: bind address and limits

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod rooms;
mod server;

pub use error::RelayError;
pub use rooms::{ConnectionId, RelayAction, RelayRooms};
pub use server::{RelayConfig, RelayServer, room_code_from_path};
