//! Session inputs and outputs.
//!
//! [`SessionEvent`] covers everything that can reach a room view: channel
//! lifecycle, inbound frames, timer ticks, player callbacks and local user
//! intents. [`SessionAction`] is what the session asks its driver to do.

use std::time::Duration;

use cowatch_proto::{RoomId, RoomPatch};

use crate::playback::PlayerStateChange;

/// Events fed into a [`crate::RoomSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Channel finished opening.
    ChannelOpened,

    /// Channel closed, by either side.
    ChannelClosed,

    /// Channel failed. Handled as a close.
    ChannelError {
        /// Transport failure description
        reason: String,
    },

    /// Text frame received from the channel.
    FrameReceived(String),

    /// A reconnect scheduled through [`SessionAction::ScheduleReconnect`] is
    /// due.
    ReconnectDue,

    /// Seek-poll timer fired.
    PollTick,

    /// Player finished loading the current video.
    PlayerReady,

    /// Player changed state on its own.
    PlayerStateChanged(PlayerStateChange),

    /// Local user pressed play.
    Play,

    /// Local user pressed pause.
    Pause,

    /// Local user toggled play/pause.
    TogglePlayback,

    /// Local user jumped to a position.
    Seek {
        /// Target position in seconds
        seconds: f64,
    },

    /// Local user sent a chat line.
    SendChat {
        /// Chat text
        message: String,
    },

    /// Local user selected a new video link.
    SetVideoUrl {
        /// New link
        url: String,
    },
}

/// Actions produced by a [`crate::RoomSession`].
///
/// Executed in order. Teardown relies on it: the poll timer stops before the
/// player is destroyed, and the player is destroyed before the channel closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Open a channel to this address.
    OpenChannel {
        /// Channel address
        address: String,
    },

    /// Send a text frame over the open channel.
    SendFrame(String),

    /// Close the current channel.
    CloseChannel,

    /// Persist a room change with the room service. Fire-and-forget.
    UpdateRoom {
        /// Room to update
        id: RoomId,
        /// Fields to change
        patch: RoomPatch,
    },

    /// Start the periodic seek-poll timer.
    StartPolling,

    /// Cancel the seek-poll timer.
    StopPolling,

    /// Release the player handle via [`crate::RoomSession::destroy_player`].
    DestroyPlayer,

    /// Deliver [`SessionEvent::ReconnectDue`] after `delay`.
    ScheduleReconnect {
        /// Backoff before the attempt
        delay: Duration,
    },

    /// Visible state changed (chat, presence, status, playback).
    Render,
}
