//! Driver trait for abstracting the frontend.
//!
//! The [`Driver`] decouples the [`crate::Runtime`] from how a room view is
//! presented. A driver owns the user's input source and the player embed's
//! callbacks, and renders the session whenever it changes. The runtime owns
//! everything else: the channel, the timers and the room service.

use std::future::Future;

use cowatch_core::{Player, RoomSession, SessionEvent, Timestamp};

/// Input produced by a driver.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverInput {
    /// Local user intent or player callback
    Session(SessionEvent),
    /// Leave the room view and stop the runtime
    Quit,
}

/// Frontend for a room view.
///
/// # Implementations
///
/// - **CLI**: stdin commands and a simulated player
/// - **Tests**: scripted inputs and a recording renderer
pub trait Driver: Send {
    /// Frontend error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Player embed handed to the session.
    type Player: Player;

    /// Instant type of the runtime's environment.
    type Instant: Timestamp;

    /// Wait for the next input.
    ///
    /// Must be cancel safe: the runtime races it against channel and timer
    /// events.
    fn next_input(&mut self) -> impl Future<Output = Result<DriverInput, Self::Error>> + Send;

    /// Present the session after a visible change.
    fn render(
        &mut self,
        session: &RoomSession<Self::Player, Self::Instant>,
    ) -> Result<(), Self::Error>;

    /// Release frontend resources. Called once, after teardown.
    fn stop(&mut self);
}
