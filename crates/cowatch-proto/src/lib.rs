//! Cowatch wire protocol
//!
//! Every frame on a room channel is a single JSON object discriminated by a
//! `type` field. This crate owns those envelopes, their text codec, and the
//! small identity types (room, address, video id) that travel with them.
//!
//! # Components
//!
//! - [`Envelope`]: tagged union of every message exchanged over a room channel
//! - [`ProtocolError`]: codec and address failures
//! - [`RoomIdentity`], [`RoomInfo`], [`RoomPatch`]: room identity as seen by
//!   the synchronization core
//! - [`channel_address`]: derives the WebSocket address for a room code
//! - [`extract_video_id`]: pulls the 11-character video id out of a link

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod envelope;
pub mod errors;
mod room;
mod video;

pub use envelope::{Envelope, EnvelopeKind, VideoAction};
pub use errors::{ProtocolError, Result};
pub use room::{OwnerRef, RoomId, RoomIdentity, RoomInfo, RoomPatch, channel_address};
pub use video::extract_video_id;
