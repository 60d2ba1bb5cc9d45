//! Playback reconciliation state machine.
//!
//! Owns the local view of shared playback and decides, for every input,
//! whether to command the player, broadcast a local intent, or both. Uses the
//! action pattern: methods take time as input and return actions for the
//! driver to execute.
//!
//! # State Machine
//!
//! ```text
//!            video_url_changed / local URL
//! ┌─────────┐ ───────────────> ┌──────────────┐  player ready  ┌──────────────────────┐
//! │ NoVideo │                  │ VideoLoading │ ─────────────> │ VideoReady{playing}  │
//! └─────────┘                  └──────────────┘ <───────────── └──────────────────────┘
//!                                      ^     video_url_changed    │ play/pause/seek
//!                                      │                          └──────┐
//!                                      └── video_url_changed             v
//!                                          (from any state)        VideoReady{..}
//! ```
//!
//! # Seek detection
//!
//! The embedded player has no "user seeked" event. The driver polls the
//! position every [`SyncConfig::poll_interval`]; a jump larger than
//! [`SyncConfig::seek_threshold`] is treated as a local seek and broadcast.
//!
//! # Invariants
//!
//! - Applying a remote command or a local seek arms a re-entrancy guard for
//!   [`SyncConfig::remote_guard`]. Polls and player callbacks inside that
//!   window never produce outbound envelopes, so a commanded jump is never
//!   re-detected as a user seek while the embed catches up.
//! - Whenever polling (re)starts, the baseline is re-sampled from the player.
//! - Player commands are only issued in `VideoReady`. Earlier commands are
//!   dropped, not queued.

use std::time::Duration;

use cowatch_proto::{Envelope, VideoAction, extract_video_id};

use crate::{env::Timestamp, error::SyncError};

/// Interval between position polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Position jump, in seconds, above which a poll counts as a user seek.
pub const DEFAULT_SEEK_THRESHOLD: f64 = 1.0;

/// Window after a remote command during which seek detection is suppressed.
pub const DEFAULT_REMOTE_GUARD: Duration = Duration::from_millis(500);

/// Window after the player reports ready during which load jitter is ignored.
pub const DEFAULT_READY_GRACE: Duration = Duration::from_secs(1);

/// Reconciliation tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Interval between position polls
    pub poll_interval: Duration,
    /// Seek detection threshold in seconds (strictly greater triggers)
    pub seek_threshold: f64,
    /// Re-entrancy guard window after applying a remote command
    pub remote_guard: Duration,
    /// Jitter mask after the player reports ready
    pub ready_grace: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            seek_threshold: DEFAULT_SEEK_THRESHOLD,
            remote_guard: DEFAULT_REMOTE_GUARD,
            ready_grace: DEFAULT_READY_GRACE,
        }
    }
}

/// Embedded video player.
///
/// The reconciler owns the handle exclusively. [`Player::destroy`] is called
/// exactly once, from [`Reconciler::destroy_player`].
pub trait Player {
    /// Construct (or reconstruct) the embed for a video. Readiness is
    /// reported back asynchronously through [`Reconciler::player_ready`].
    fn load(&mut self, video_id: &str);

    /// Start playback.
    fn play(&mut self);

    /// Pause playback.
    fn pause(&mut self);

    /// Jump to a position in seconds.
    fn seek_to(&mut self, seconds: f64);

    /// Current position in seconds. `None` if the embed has no video.
    fn current_time(&self) -> Option<f64>;

    /// Release the embed. No other method is called afterwards.
    fn destroy(&mut self);
}

/// Native playback state reported by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStateChange {
    /// Player started playing
    Playing,
    /// Player paused
    Paused,
}

/// Reconciler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// No video selected
    NoVideo,
    /// Video selected, player not ready yet
    VideoLoading,
    /// Player ready and accepting commands
    VideoReady {
        /// Whether the player is playing
        is_playing: bool,
    },
}

/// Local view of shared playback.
///
/// Positions are only trusted as of the last observation. No extrapolation
/// from timestamps is attempted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    /// Whether playback is running
    pub is_playing: bool,
    /// Last observed or commanded position in seconds
    pub last_known_time: f64,
    /// Video id of the current link. `None` if no link or not a recognised
    /// link.
    pub video_id: Option<String>,
    /// Current video link
    pub video_url: Option<String>,
}

/// Actions returned by the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackAction {
    /// Send this envelope to the room
    Broadcast(Envelope),
    /// Persist the new video link with the room service (fire-and-forget)
    PersistVideoUrl(String),
    /// Start the periodic position poll
    StartPolling,
    /// Cancel the periodic position poll
    StopPolling,
}

/// Playback reconciliation state machine.
///
/// Generic over the player handle and the instant type so tests can drive it
/// with a fake player and hand-built instants.
#[derive(Debug)]
pub struct Reconciler<P, I> {
    phase: PlaybackPhase,
    state: PlaybackState,
    config: SyncConfig,
    username: String,
    /// `None` once destroyed
    player: Option<P>,
    /// Start and length of the current suppression window
    guard: Option<(I, Duration)>,
}

impl<P, I> Reconciler<P, I>
where
    P: Player,
    I: Timestamp,
{
    /// Create a reconciler in `NoVideo` that owns `player`.
    pub fn new(player: P, username: impl Into<String>, config: SyncConfig) -> Self {
        Self {
            phase: PlaybackPhase::NoVideo,
            state: PlaybackState::default(),
            config,
            username: username.into(),
            player: Some(player),
            guard: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    /// Current playback state.
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Reconciliation tuning.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Player handle. `None` after [`Reconciler::destroy_player`].
    pub fn player(&self) -> Option<&P> {
        self.player.as_ref()
    }

    /// Whether seek detection is currently suppressed.
    pub fn is_applying_remote(&self, now: I) -> bool {
        self.guard.is_some_and(|(since, window)| now >= since && now - since < window)
    }

    /// Local user pressed play.
    pub fn local_play(&mut self) -> Result<Vec<PlaybackAction>, SyncError> {
        self.local_set_playing(true)
    }

    /// Local user pressed pause.
    pub fn local_pause(&mut self) -> Result<Vec<PlaybackAction>, SyncError> {
        self.local_set_playing(false)
    }

    /// Local user toggled play/pause.
    pub fn local_toggle(&mut self) -> Result<Vec<PlaybackAction>, SyncError> {
        let target = !self.state.is_playing;
        self.local_set_playing(target)
    }

    /// Local user jumped to `seconds`.
    ///
    /// Arms the guard: an embed that has not applied the jump yet keeps
    /// reporting the old position for a few polls.
    pub fn local_seek(&mut self, seconds: f64, now: I) -> Result<Vec<PlaybackAction>, SyncError> {
        let seconds = seconds.max(0.0);
        self.ready_player("seek")?.seek_to(seconds);
        self.state.last_known_time = seconds;
        self.arm_guard(now, self.config.remote_guard);
        Ok(vec![PlaybackAction::Broadcast(Envelope::seek(seconds, self.username.clone()))])
    }

    /// Local user selected a new video link.
    ///
    /// Loads the video, broadcasts the change, and asks the driver to persist
    /// it with the room service.
    pub fn local_set_url(&mut self, url: &str) -> Vec<PlaybackAction> {
        let mut actions = self.begin_loading(url);
        actions.push(PlaybackAction::Broadcast(Envelope::video_url_changed(
            url,
            self.username.clone(),
        )));
        actions.push(PlaybackAction::PersistVideoUrl(url.to_string()));
        actions
    }

    /// Adopt the room's stored video link when entering a room view.
    pub fn restore_url(&mut self, url: &str) -> Vec<PlaybackAction> {
        self.begin_loading(url)
    }

    /// Apply a remote playback envelope that passed echo suppression.
    ///
    /// Non-playback envelopes are ignored.
    ///
    /// # Errors
    ///
    /// - `SyncError::PlayerUnavailable` for play/pause/seek before the player
    ///   is ready; the command is dropped
    pub fn apply_remote(
        &mut self,
        envelope: &Envelope,
        now: I,
    ) -> Result<Vec<PlaybackAction>, SyncError> {
        match envelope {
            Envelope::VideoAction { action, username } => {
                let player = self.ready_player(command_name(*action))?;
                match action {
                    VideoAction::Play => player.play(),
                    VideoAction::Pause => player.pause(),
                }
                tracing::debug!(%username, %action, "applied remote video action");
                self.set_playing(action.is_play());
                self.arm_guard(now, self.config.remote_guard);
                Ok(vec![])
            },
            Envelope::Seek { timestamp, username } => {
                let seconds = timestamp.max(0.0);
                self.ready_player("seek")?.seek_to(seconds);
                tracing::debug!(%username, seconds, "applied remote seek");
                self.state.last_known_time = seconds;
                self.arm_guard(now, self.config.remote_guard);
                Ok(vec![])
            },
            Envelope::VideoUrlChanged { url, username } => {
                tracing::debug!(%username, %url, "applied remote video change");
                Ok(self.begin_loading(url))
            },
            Envelope::Join { .. }
            | Envelope::ChatMessage { .. }
            | Envelope::UserJoined { .. }
            | Envelope::UserLeft { .. } => Ok(vec![]),
        }
    }

    /// The player finished loading the current video.
    ///
    /// Ignored unless `VideoLoading`. Starts the ready grace window so load
    /// jitter is not mistaken for a seek.
    pub fn player_ready(&mut self, now: I) -> Vec<PlaybackAction> {
        if self.phase != PlaybackPhase::VideoLoading {
            tracing::debug!(phase = ?self.phase, "ignoring player ready");
            return vec![];
        }

        self.phase = PlaybackPhase::VideoReady { is_playing: false };
        self.state.is_playing = false;
        self.state.last_known_time =
            self.player.as_ref().and_then(Player::current_time).unwrap_or(0.0);
        self.arm_guard(now, self.config.ready_grace);

        vec![PlaybackAction::StartPolling]
    }

    /// The player changed state on its own (native controls, buffering end).
    ///
    /// Outside the guard window, a change that disagrees with the tracked
    /// state is treated as a local intent and broadcast.
    pub fn player_state_changed(&mut self, change: PlayerStateChange, now: I) -> Vec<PlaybackAction> {
        if !matches!(self.phase, PlaybackPhase::VideoReady { .. }) || self.is_applying_remote(now) {
            return vec![];
        }

        let is_playing = change == PlayerStateChange::Playing;
        if is_playing == self.state.is_playing {
            return vec![];
        }

        self.set_playing(is_playing);
        vec![PlaybackAction::Broadcast(Envelope::video_action(
            VideoAction::from_playing(is_playing),
            self.username.clone(),
        ))]
    }

    /// Sample the player position.
    ///
    /// A jump strictly greater than the seek threshold since the previous
    /// sample becomes an outbound `seek`, unless the guard is armed.
    pub fn poll(&mut self, now: I) -> Vec<PlaybackAction> {
        if !matches!(self.phase, PlaybackPhase::VideoReady { .. }) {
            return vec![];
        }
        let Some(position) = self.player.as_ref().and_then(Player::current_time) else {
            return vec![];
        };

        let delta = (position - self.state.last_known_time).abs();
        self.state.last_known_time = position;

        if self.is_applying_remote(now) || delta <= self.config.seek_threshold {
            return vec![];
        }

        tracing::debug!(position, delta, "detected local seek");
        vec![PlaybackAction::Broadcast(Envelope::seek(position, self.username.clone()))]
    }

    /// Take the player's current position as the seek-detection baseline.
    ///
    /// Called when polling restarts after a gap, so playback that continued
    /// while nobody was polling is not mistaken for a jump.
    pub fn resample_position(&mut self) {
        if !matches!(self.phase, PlaybackPhase::VideoReady { .. }) {
            return;
        }
        if let Some(position) = self.player.as_ref().and_then(Player::current_time) {
            self.state.last_known_time = position;
        }
    }

    /// Forget the current video, e.g. when switching rooms.
    pub fn unload(&mut self) -> Vec<PlaybackAction> {
        let was_ready = matches!(self.phase, PlaybackPhase::VideoReady { .. });
        self.phase = PlaybackPhase::NoVideo;
        self.state = PlaybackState::default();
        self.guard = None;
        if was_ready { vec![PlaybackAction::StopPolling] } else { vec![] }
    }

    /// Release the player handle. Idempotent.
    ///
    /// Callers must have cancelled polling first.
    pub fn destroy_player(&mut self) {
        if let Some(mut player) = self.player.take() {
            player.destroy();
        }
        self.phase = PlaybackPhase::NoVideo;
        self.guard = None;
    }

    fn local_set_playing(&mut self, is_playing: bool) -> Result<Vec<PlaybackAction>, SyncError> {
        let action = VideoAction::from_playing(is_playing);
        let player = self.ready_player(command_name(action))?;
        if is_playing {
            player.play();
        } else {
            player.pause();
        }
        self.set_playing(is_playing);
        Ok(vec![PlaybackAction::Broadcast(Envelope::video_action(action, self.username.clone()))])
    }

    fn begin_loading(&mut self, url: &str) -> Vec<PlaybackAction> {
        let mut actions = Vec::new();
        if matches!(self.phase, PlaybackPhase::VideoReady { .. }) {
            actions.push(PlaybackAction::StopPolling);
        }

        let video_id = extract_video_id(url);
        match (&video_id, self.player.as_mut()) {
            (Some(id), Some(player)) => player.load(id),
            (None, _) => tracing::warn!(%url, "no video id in link; player not loaded"),
            (Some(_), None) => tracing::warn!(%url, "player destroyed; video not loaded"),
        }

        self.phase = PlaybackPhase::VideoLoading;
        self.state = PlaybackState {
            is_playing: false,
            last_known_time: 0.0,
            video_id,
            video_url: Some(url.to_string()),
        };
        self.guard = None;
        actions
    }

    fn ready_player(&mut self, command: &'static str) -> Result<&mut P, SyncError> {
        match (self.phase, self.player.as_mut()) {
            (PlaybackPhase::VideoReady { .. }, Some(player)) => Ok(player),
            _ => Err(SyncError::PlayerUnavailable { command }),
        }
    }

    fn set_playing(&mut self, is_playing: bool) {
        self.state.is_playing = is_playing;
        self.phase = PlaybackPhase::VideoReady { is_playing };
    }

    fn arm_guard(&mut self, now: I, window: Duration) {
        self.guard = Some((now, window));
    }
}

fn command_name(action: VideoAction) -> &'static str {
    match action {
        VideoAction::Play => "play",
        VideoAction::Pause => "pause",
    }
}
