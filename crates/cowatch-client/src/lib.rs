//! Client runtime for cowatch rooms
//!
//! Async plumbing around the synchronization core: the WebSocket channel,
//! the seek-poll and reconnect timers, the room service and the event loop
//! that feeds them all into a [`cowatch_core::RoomSession`].
//!
//! # Components
//!
//! - [`Driver`]: trait for frontends (input, player callbacks, rendering)
//! - [`Runtime`]: event loop for one room view
//! - [`RoomService`]: room lookup and video link persistence
//! - [`transport`]: one task per WebSocket channel

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod error;
mod poll;
mod rooms;
mod runtime;
mod system_env;
pub mod transport;

pub use driver::{Driver, DriverInput};
pub use error::{RoomServiceError, RuntimeError, TransportError};
pub use poll::{PollTask, ReconnectTimer, TimerEvent};
pub use rooms::{HttpRoomService, MemoryRoomService, RoomSelector, RoomService, enter_room};
pub use runtime::Runtime;
pub use system_env::SystemEnv;
pub use transport::{ChannelEvent, ChannelEventKind, ChannelHandle, ChannelId};
