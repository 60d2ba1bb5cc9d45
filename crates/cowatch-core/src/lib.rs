//! Synchronization core
//!
//! Sans-IO state machines that keep a room of viewers in lock-step: which
//! inbound envelopes to apply, when to command the player, when to broadcast
//! a local intent, and how the channel lifecycle gates all of it.
//!
//! # Architecture
//!
//! Every component is a pure state machine. Time is an input, I/O is an
//! output: methods take `now` and return actions for a driver to execute.
//! The same code runs against a real WebSocket and against scripted tests.
//!
//! # Components
//!
//! - [`EchoFilter`]: drops self-originated playback envelopes
//! - [`Reconciler`]: playback state machine and seek detection
//! - [`PresenceRelay`]: chat log and online count
//! - [`ConnectionSupervisor`]: channel lifecycle and join handshake
//! - [`RoomSession`]: composes all of the above for one room view

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
mod error;
mod event;
mod filter;
mod playback;
mod presence;
mod session;
mod supervisor;

pub use cowatch_proto as proto;
pub use env::{Environment, Timestamp};
pub use error::SyncError;
pub use event::{SessionAction, SessionEvent};
pub use filter::{EchoFilter, IdentityMatcher, UsernameMatcher, should_apply};
pub use playback::{
    DEFAULT_POLL_INTERVAL, DEFAULT_READY_GRACE, DEFAULT_REMOTE_GUARD, DEFAULT_SEEK_THRESHOLD,
    PlaybackAction, PlaybackPhase, PlaybackState, Player, PlayerStateChange, Reconciler,
    SyncConfig,
};
pub use presence::{ChatLine, PresenceRelay};
pub use session::{RoomSession, SessionConfig};
pub use supervisor::{
    ConnectionState, ConnectionSupervisor, DEFAULT_RECONNECT_INITIAL_DELAY,
    DEFAULT_RECONNECT_MAX_DELAY, ReconnectPolicy, SupervisorAction,
};
