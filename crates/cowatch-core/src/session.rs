//! Room view session.
//!
//! Composes the connection supervisor, echo filter, playback reconciler and
//! presence relay for one room view. Inbound frames flow
//! codec → filter → reconciler (playback) or relay (chat/presence); local
//! intents flow reconciler → codec → channel.
//!
//! Like the components it wraps, the session is pure: the driver feeds it
//! [`SessionEvent`]s one at a time and executes the returned
//! [`SessionAction`]s in order.

use cowatch_proto::{Envelope, RoomInfo, RoomPatch};

use crate::{
    env::Timestamp,
    error::SyncError,
    event::{SessionAction, SessionEvent},
    filter::{EchoFilter, IdentityMatcher, UsernameMatcher},
    playback::{PlaybackAction, PlaybackPhase, PlaybackState, Player, Reconciler, SyncConfig},
    presence::{ChatLine, PresenceRelay},
    supervisor::{ConnectionState, ConnectionSupervisor, ReconnectPolicy, SupervisorAction},
};

/// Per-participant session settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Local participant, sent in every outbound envelope
    pub username: String,
    /// Reconciliation tuning
    pub sync: SyncConfig,
    /// Reconnect behaviour after an unexpected close
    pub reconnect: ReconnectPolicy,
}

impl SessionConfig {
    /// Default tuning and no reconnects for `username`.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            sync: SyncConfig::default(),
            reconnect: ReconnectPolicy::disabled(),
        }
    }
}

/// Synchronization state for one room view.
///
/// # Type Parameters
///
/// - `P`: player handle, owned exclusively
/// - `I`: instant type (real or virtual time)
/// - `M`: echo-suppression identity matcher
#[derive(Debug)]
pub struct RoomSession<P, I, M = UsernameMatcher> {
    room: RoomInfo,
    username: String,
    supervisor: ConnectionSupervisor,
    filter: EchoFilter<M>,
    reconciler: Reconciler<P, I>,
    presence: PresenceRelay,
    /// Whether the driver's poll timer is running
    polling: bool,
    /// Transient status line. `None` if nothing to report.
    status_message: Option<String>,
}

impl<P, I> RoomSession<P, I, UsernameMatcher>
where
    P: Player,
    I: Timestamp,
{
    /// Session for `room` on the channel at `address`, suppressing echoes by
    /// username.
    pub fn new(room: RoomInfo, address: impl Into<String>, player: P, config: SessionConfig) -> Self {
        let matcher = UsernameMatcher::new(config.username.clone());
        Self::with_matcher(room, address, player, matcher, config)
    }
}

impl<P, I, M> RoomSession<P, I, M>
where
    P: Player,
    I: Timestamp,
    M: IdentityMatcher,
{
    /// Session with a custom identity matcher.
    pub fn with_matcher(
        room: RoomInfo,
        address: impl Into<String>,
        player: P,
        matcher: M,
        config: SessionConfig,
    ) -> Self {
        let SessionConfig { username, sync, reconnect } = config;
        Self {
            room,
            supervisor: ConnectionSupervisor::new(address, username.clone(), reconnect),
            filter: EchoFilter::new(matcher),
            reconciler: Reconciler::new(player, username.clone(), sync),
            presence: PresenceRelay::new(),
            username,
            polling: false,
            status_message: None,
        }
    }

    /// Enter the room view: open the channel and load the room's stored
    /// video, if any.
    pub fn open(&mut self) -> Vec<SessionAction> {
        tracing::info!(room = %self.room.code, username = %self.username, "entering room");
        let opened = self.supervisor.connect();
        let mut actions = self.supervisor_actions(opened);

        if let Some(url) = self.room.youtube_url.clone() {
            let restored = self.reconciler.restore_url(&url);
            actions.extend(self.playback_actions(restored));
        }

        self.status_message = Some(format!("connecting to room {}", self.room.code));
        actions.push(SessionAction::Render);
        self.sync_polling(&mut actions);
        actions
    }

    /// Process one event.
    ///
    /// `now` is the time the event was taken off the queue.
    pub fn handle(&mut self, event: SessionEvent, now: I) -> Vec<SessionAction> {
        let mut actions = match event {
            SessionEvent::ChannelOpened => self.channel_opened(),
            SessionEvent::ChannelClosed => {
                let closed = self.supervisor.on_close();
                self.channel_lost(closed)
            },
            SessionEvent::ChannelError { reason } => {
                let closed = self.supervisor.on_error(&reason);
                self.channel_lost(closed)
            },
            SessionEvent::FrameReceived(text) => self.frame_received(&text, now),
            SessionEvent::ReconnectDue => {
                let reopened = self.supervisor.reconnect_due();
                self.supervisor_actions(reopened)
            },
            SessionEvent::PollTick => {
                let polled = self.reconciler.poll(now);
                self.playback_actions(polled)
            },
            SessionEvent::PlayerReady => {
                let ready = self.reconciler.player_ready(now);
                let mut actions = self.playback_actions(ready);
                actions.push(SessionAction::Render);
                actions
            },
            SessionEvent::PlayerStateChanged(change) => {
                let changed = self.reconciler.player_state_changed(change, now);
                let mut actions = self.playback_actions(changed);
                if !actions.is_empty() {
                    actions.push(SessionAction::Render);
                }
                actions
            },
            SessionEvent::Play => {
                let result = self.reconciler.local_play();
                self.local_intent(result)
            },
            SessionEvent::Pause => {
                let result = self.reconciler.local_pause();
                self.local_intent(result)
            },
            SessionEvent::TogglePlayback => {
                let result = self.reconciler.local_toggle();
                self.local_intent(result)
            },
            SessionEvent::Seek { seconds } => {
                let result = self.reconciler.local_seek(seconds, now);
                self.local_intent(result)
            },
            SessionEvent::SendChat { message } => {
                let chat = Envelope::chat(message, self.username.clone());
                let mut actions: Vec<_> = self.send(&chat).into_iter().collect();
                actions.push(SessionAction::Render);
                actions
            },
            SessionEvent::SetVideoUrl { url } => {
                let result = Ok(self.reconciler.local_set_url(&url));
                self.local_intent(result)
            },
        };

        self.sync_polling(&mut actions);
        actions
    }

    /// Leave the room view.
    ///
    /// Always returns, in order: stop the poll timer, destroy the player,
    /// close the channel. No reconnect follows.
    pub fn teardown(&mut self) -> Vec<SessionAction> {
        tracing::info!(room = %self.room.code, "leaving room");
        let _ = self.supervisor.disconnect();
        let _ = self.reconciler.unload();
        self.polling = false;
        self.status_message = Some("left room".to_string());

        vec![SessionAction::StopPolling, SessionAction::DestroyPlayer, SessionAction::CloseChannel]
    }

    /// Move the room view to a different room.
    ///
    /// The chat log, presence count and playback state are discarded and a
    /// new channel is opened. The player handle is kept. Switching to the
    /// same room is a no-op.
    pub fn switch_room(&mut self, room: RoomInfo, address: impl Into<String>) -> Vec<SessionAction> {
        if room.identity() == self.room.identity() {
            return vec![];
        }

        tracing::info!(from = %self.room.code, to = %room.code, "switching room");
        let _ = self.reconciler.unload();
        self.presence.clear();
        self.room = room;

        let retargeted = self.supervisor.retarget(address);
        let mut actions = self.supervisor_actions(retargeted);
        if let Some(url) = self.room.youtube_url.clone() {
            let restored = self.reconciler.restore_url(&url);
            actions.extend(self.playback_actions(restored));
        }

        self.status_message = Some(format!("connecting to room {}", self.room.code));
        actions.push(SessionAction::Render);
        self.sync_polling(&mut actions);
        actions
    }

    /// Release the player handle. Idempotent.
    pub fn destroy_player(&mut self) {
        self.reconciler.destroy_player();
    }

    /// Room this view is bound to.
    pub fn room(&self) -> &RoomInfo {
        &self.room
    }

    /// Local participant.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Current connectivity.
    pub fn connection_state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    /// Current playback phase.
    pub fn phase(&self) -> PlaybackPhase {
        self.reconciler.phase()
    }

    /// Local view of shared playback.
    pub fn playback(&self) -> &PlaybackState {
        self.reconciler.state()
    }

    /// Chat log in receive order.
    pub fn chat_log(&self) -> &[ChatLine] {
        self.presence.log()
    }

    /// Participants online as last reported by the server.
    pub fn online_count(&self) -> u32 {
        self.presence.online_count()
    }

    /// Transient status line.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Player handle. `None` after the player was destroyed.
    pub fn player(&self) -> Option<&P> {
        self.reconciler.player()
    }

    /// Whether the poll timer should be running.
    pub fn is_polling(&self) -> bool {
        self.polling
    }

    /// Reconciliation tuning in use.
    pub fn sync_config(&self) -> &SyncConfig {
        self.reconciler.config()
    }

    fn channel_opened(&mut self) -> Vec<SessionAction> {
        match self.supervisor.on_open() {
            Ok(opened) => {
                if self.supervisor.state() == ConnectionState::Open {
                    self.status_message = Some(format!("connected to room {}", self.room.code));
                }
                let mut actions = self.supervisor_actions(opened);
                actions.push(SessionAction::Render);
                actions
            },
            Err(error) => {
                tracing::warn!(%error, "failed to send join");
                vec![]
            },
        }
    }

    fn channel_lost(&mut self, closed: Vec<SupervisorAction>) -> Vec<SessionAction> {
        self.status_message = Some("disconnected".to_string());
        let mut actions = self.supervisor_actions(closed);
        actions.push(SessionAction::Render);
        actions
    }

    fn frame_received(&mut self, text: &str, now: I) -> Vec<SessionAction> {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                let error = SyncError::MalformedEnvelope(e);
                tracing::warn!(%error, "ignoring inbound frame");
                return vec![];
            },
        };

        let kind = envelope.kind();
        if !self.filter.should_apply(&envelope) {
            tracing::debug!(%kind, "suppressed echo");
            return vec![];
        }

        if kind.is_presence_or_chat() {
            return if self.presence.apply(&envelope) { vec![SessionAction::Render] } else { vec![] };
        }

        if !kind.is_playback() {
            tracing::debug!(%kind, "ignoring server-bound envelope");
            return vec![];
        }

        match self.reconciler.apply_remote(&envelope, now) {
            Ok(applied) => {
                let mut actions = self.playback_actions(applied);
                actions.push(SessionAction::Render);
                actions
            },
            Err(error) => {
                tracing::warn!(%error, username = envelope.username(), "remote command dropped");
                vec![]
            },
        }
    }

    fn local_intent(
        &mut self,
        result: Result<Vec<PlaybackAction>, SyncError>,
    ) -> Vec<SessionAction> {
        match result {
            Ok(intent) => {
                let mut actions = self.playback_actions(intent);
                actions.push(SessionAction::Render);
                actions
            },
            Err(error) => {
                tracing::warn!(%error, "local command dropped");
                self.status_message = Some(error.to_string());
                vec![SessionAction::Render]
            },
        }
    }

    fn send(&mut self, envelope: &Envelope) -> Option<SessionAction> {
        match self.supervisor.send(envelope) {
            Ok(text) => Some(SessionAction::SendFrame(text)),
            Err(error) => {
                tracing::warn!(%error, kind = %envelope.kind(), "outbound envelope dropped");
                self.status_message = Some(format!("not connected: {} not sent", envelope.kind()));
                None
            },
        }
    }

    /// Polling actions from the reconciler are dropped here; the timer is
    /// driven by [`Self::sync_polling`] instead.
    fn playback_actions(&mut self, actions: Vec<PlaybackAction>) -> Vec<SessionAction> {
        let mut out = Vec::with_capacity(actions.len());
        for action in actions {
            match action {
                PlaybackAction::Broadcast(envelope) => out.extend(self.send(&envelope)),
                PlaybackAction::PersistVideoUrl(url) => out.push(SessionAction::UpdateRoom {
                    id: self.room.id,
                    patch: RoomPatch::video_url(url),
                }),
                PlaybackAction::StartPolling | PlaybackAction::StopPolling => {},
            }
        }
        out
    }

    fn supervisor_actions(&mut self, actions: Vec<SupervisorAction>) -> Vec<SessionAction> {
        actions
            .into_iter()
            .map(|action| match action {
                SupervisorAction::Open { address } => SessionAction::OpenChannel { address },
                SupervisorAction::Send(text) => SessionAction::SendFrame(text),
                SupervisorAction::Close => SessionAction::CloseChannel,
                SupervisorAction::ScheduleReconnect { delay, attempt } => {
                    self.status_message =
                        Some(format!("disconnected; reconnecting in {delay:?} (attempt {attempt})"));
                    SessionAction::ScheduleReconnect { delay }
                },
            })
            .collect()
    }

    /// Poll only while a video is ready and the channel is open.
    ///
    /// The baseline is re-sampled on every start: the video may have kept
    /// playing while the channel was down.
    fn sync_polling(&mut self, actions: &mut Vec<SessionAction>) {
        let wanted = matches!(self.reconciler.phase(), PlaybackPhase::VideoReady { .. })
            && self.supervisor.state() == ConnectionState::Open;

        if wanted == self.polling {
            return;
        }
        self.polling = wanted;
        if wanted {
            self.reconciler.resample_position();
        }
        actions.push(if wanted { SessionAction::StartPolling } else { SessionAction::StopPolling });
    }
}
