//! Connection supervisor.
//!
//! Owns the channel lifecycle for one room view: opening, the join handshake,
//! the optional reconnect policy, and the connectivity state shown to the
//! user.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  connect   ┌────────────┐  opened   ┌──────┐
//! │ Closed │──────────>│ Connecting │─────────>│ Open │
//! └────────┘           └────────────┘          └──────┘
//!      ^                     │ closed/error        │ closed/error
//!      └─────────────────────┴─────────────────────┘
//! ```
//!
//! On `Open` the supervisor immediately sends `join`. There is no
//! acknowledgement; the client proceeds optimistically.

use std::time::Duration;

use cowatch_proto::Envelope;

use crate::error::SyncError;

/// Backoff before the first reconnect attempt.
pub const DEFAULT_RECONNECT_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on the backoff between reconnect attempts.
pub const DEFAULT_RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

/// User-visible connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Channel is being opened
    Connecting,
    /// Channel open, sends allowed
    Open,
    /// No channel. Sends are rejected.
    Closed,
}

/// Reconnect behaviour after an unexpected close.
///
/// The default is disabled: connect once per room view and surface the
/// disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts before giving up. Zero disables reconnecting.
    pub max_attempts: u32,
    /// Delay before the first attempt
    pub initial_delay: Duration,
    /// Cap on the exponential backoff
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    /// Never reconnect.
    pub fn disabled() -> Self {
        Self { max_attempts: 0, ..Self::backoff(0) }
    }

    /// Exponential backoff with the default delays.
    pub fn backoff(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: DEFAULT_RECONNECT_INITIAL_DELAY,
            max_delay: DEFAULT_RECONNECT_MAX_DELAY,
        }
    }

    /// Whether any reconnect will ever be attempted.
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// Delay before the given attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay.saturating_mul(1 << exponent).min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Actions returned by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorAction {
    /// Open a channel to this address
    Open {
        /// Channel address
        address: String,
    },
    /// Send this text frame
    Send(String),
    /// Close the current channel
    Close,
    /// Call [`ConnectionSupervisor::reconnect_due`] after `delay`
    ScheduleReconnect {
        /// Backoff before the attempt
        delay: Duration,
        /// Attempt number (1-based)
        attempt: u32,
    },
}

/// Connection supervisor state machine.
///
/// Pure: no I/O. The driver executes the returned actions and feeds channel
/// lifecycle events back in.
#[derive(Debug, Clone)]
pub struct ConnectionSupervisor {
    state: ConnectionState,
    address: String,
    username: String,
    policy: ReconnectPolicy,
    /// Reconnect attempts since the last successful open
    attempts: u32,
    /// Room view is active. Cleared by `disconnect`.
    active: bool,
}

impl ConnectionSupervisor {
    /// Supervisor for one room address, initially `Closed`.
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            state: ConnectionState::Closed,
            address: address.into(),
            username: username.into(),
            policy,
            attempts: 0,
            active: false,
        }
    }

    /// Current connectivity.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Address of the room channel.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Reconnect attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Open the channel for the room view.
    pub fn connect(&mut self) -> Vec<SupervisorAction> {
        self.active = true;
        self.state = ConnectionState::Connecting;
        tracing::info!(address = %self.address, "connecting");
        vec![SupervisorAction::Open { address: self.address.clone() }]
    }

    /// Channel reported open. Sends the join handshake.
    pub fn on_open(&mut self) -> Result<Vec<SupervisorAction>, SyncError> {
        if !self.active {
            tracing::debug!("channel opened after disconnect; closing");
            return Ok(vec![SupervisorAction::Close]);
        }

        self.state = ConnectionState::Open;
        self.attempts = 0;
        tracing::info!(address = %self.address, username = %self.username, "channel open");

        let join = Envelope::join(self.username.clone()).encode()?;
        Ok(vec![SupervisorAction::Send(join)])
    }

    /// Channel reported closed.
    ///
    /// Schedules a reconnect if the room view is still active and the policy
    /// allows another attempt.
    pub fn on_close(&mut self) -> Vec<SupervisorAction> {
        if self.state == ConnectionState::Closed {
            return vec![];
        }
        self.state = ConnectionState::Closed;
        tracing::info!(address = %self.address, "channel closed");

        if !self.active || !self.policy.is_enabled() {
            return vec![];
        }
        if self.attempts >= self.policy.max_attempts {
            tracing::warn!(attempts = self.attempts, "giving up on reconnect");
            return vec![];
        }

        self.attempts += 1;
        let delay = self.policy.delay_for(self.attempts);
        vec![SupervisorAction::ScheduleReconnect { delay, attempt: self.attempts }]
    }

    /// Channel reported an error. Treated as a close.
    pub fn on_error(&mut self, reason: &str) -> Vec<SupervisorAction> {
        tracing::warn!(address = %self.address, %reason, "channel error");
        self.on_close()
    }

    /// A scheduled reconnect is due.
    pub fn reconnect_due(&mut self) -> Vec<SupervisorAction> {
        if !self.active || self.state != ConnectionState::Closed {
            return vec![];
        }
        self.state = ConnectionState::Connecting;
        tracing::info!(address = %self.address, attempt = self.attempts, "reconnecting");
        vec![SupervisorAction::Open { address: self.address.clone() }]
    }

    /// Encode `envelope` for sending.
    ///
    /// # Errors
    ///
    /// - `SyncError::ChannelClosed` if the channel is not `Open`; the envelope
    ///   is dropped and not retried
    pub fn send(&self, envelope: &Envelope) -> Result<String, SyncError> {
        if self.state != ConnectionState::Open {
            return Err(SyncError::ChannelClosed { state: self.state });
        }
        Ok(envelope.encode()?)
    }

    /// Point the room view at a different address.
    ///
    /// Closes the current channel and opens a new one. Same address is a
    /// no-op.
    pub fn retarget(&mut self, address: impl Into<String>) -> Vec<SupervisorAction> {
        let address = address.into();
        if address == self.address {
            return vec![];
        }

        let mut actions = Vec::new();
        if self.state != ConnectionState::Closed {
            actions.push(SupervisorAction::Close);
        }
        self.address = address;
        self.attempts = 0;
        actions.extend(self.connect());
        actions
    }

    /// Leave the room view. No reconnect follows.
    pub fn disconnect(&mut self) -> Vec<SupervisorAction> {
        self.active = false;
        let was_closed = self.state == ConnectionState::Closed;
        self.state = ConnectionState::Closed;
        if was_closed { vec![] } else { vec![SupervisorAction::Close] }
    }
}
