//! Async runtime for one room view.
//!
//! The Runtime drives the event loop, coordinating between:
//! - [`RoomSession`]: synchronization state machine
//! - [`Driver`]: user input, player callbacks and rendering
//! - the channel task, poll task and reconnect timers
//! - a [`RoomService`] for persisting video link changes
//!
//! Every event is handled to completion before the next one is taken, so the
//! session never sees interleaved frames.

use std::{sync::Arc, time::Duration};

use cowatch_core::{Environment, RoomSession, SessionAction, SessionEvent};
use cowatch_proto::{RoomId, RoomPatch};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    Driver, DriverInput,
    error::RuntimeError,
    poll::{PollTask, ReconnectTimer, TimerEvent},
    rooms::RoomService,
    transport::{self, ChannelEvent, ChannelEventKind, ChannelHandle, ChannelId},
};

/// Capacity of the channel and timer event queues.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// How long shutdown waits for close frames to flush.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Runtime that owns a session and everything it talks to.
///
/// # Type Parameters
///
/// - `D`: frontend driver
/// - `E`: environment for time
/// - `R`: room service
pub struct Runtime<D, E, R>
where
    D: Driver,
    E: Environment,
{
    driver: D,
    env: E,
    rooms: Arc<R>,
    session: RoomSession<D::Player, E::Instant>,
    channel: Option<ChannelHandle>,
    next_channel: ChannelId,
    channel_tx: mpsc::Sender<ChannelEvent>,
    channel_rx: mpsc::Receiver<ChannelEvent>,
    timer_tx: mpsc::Sender<TimerEvent>,
    timer_rx: mpsc::Receiver<TimerEvent>,
    poll: Option<PollTask>,
    next_poll: u64,
    /// Pending reconnect. Dropped (and so cancelled) when a channel is
    /// opened or closed for any other reason.
    reconnect: Option<ReconnectTimer>,
    next_reconnect: u64,
    closing: Vec<JoinHandle<()>>,
}

impl<D, E, R> Runtime<D, E, R>
where
    D: Driver<Instant = E::Instant>,
    E: Environment,
    R: RoomService,
{
    /// Create a runtime for an unopened session.
    pub fn new(driver: D, env: E, rooms: R, session: RoomSession<D::Player, E::Instant>) -> Self {
        let (channel_tx, channel_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (timer_tx, timer_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        Self {
            driver,
            env,
            rooms: Arc::new(rooms),
            session,
            channel: None,
            next_channel: 0,
            channel_tx,
            channel_rx,
            timer_tx,
            timer_rx,
            poll: None,
            next_poll: 0,
            reconnect: None,
            next_reconnect: 0,
            closing: Vec::new(),
        }
    }

    /// Session being driven.
    pub fn session(&self) -> &RoomSession<D::Player, E::Instant> {
        &self.session
    }

    /// Run until the driver quits, then tear the room view down.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Driver` if the driver fails to read input or render.
    ///   The room view is still torn down.
    pub async fn run(mut self) -> Result<(), RuntimeError> {
        let actions = self.session.open();
        let result = match self.execute(actions) {
            Ok(()) => self.event_loop().await,
            Err(e) => Err(e),
        };

        self.shutdown().await;
        result
    }

    async fn event_loop(&mut self) -> Result<(), RuntimeError> {
        loop {
            let event = tokio::select! {
                input = self.driver.next_input() => match input.map_err(RuntimeError::driver)? {
                    DriverInput::Session(event) => Some(event),
                    DriverInput::Quit => break,
                },
                Some(event) = self.channel_rx.recv() => self.channel_event(event),
                Some(timer) = self.timer_rx.recv() => self.timer_event(timer),
            };

            if let Some(event) = event {
                self.dispatch(event)?;
            }
        }

        tracing::debug!("driver quit");
        Ok(())
    }

    fn dispatch(&mut self, event: SessionEvent) -> Result<(), RuntimeError> {
        let actions = self.session.handle(event, self.env.now());
        self.execute(actions)
    }

    /// Translate a channel event, dropping events from replaced channels.
    fn channel_event(&mut self, event: ChannelEvent) -> Option<SessionEvent> {
        let current = self.channel.as_ref().map(ChannelHandle::id);
        if current != Some(event.channel) {
            tracing::trace!(channel = event.channel, ?current, "dropping stale channel event");
            return None;
        }

        Some(match event.kind {
            ChannelEventKind::Opened => SessionEvent::ChannelOpened,
            ChannelEventKind::Frame(text) => SessionEvent::FrameReceived(text),
            ChannelEventKind::Closed => {
                self.channel = None;
                SessionEvent::ChannelClosed
            },
            ChannelEventKind::Error(reason) => {
                self.channel = None;
                SessionEvent::ChannelError { reason }
            },
        })
    }

    fn timer_event(&mut self, timer: TimerEvent) -> Option<SessionEvent> {
        match timer {
            TimerEvent::PollTick { generation } => {
                let current = self.poll.as_ref().map(PollTask::generation);
                (current == Some(generation)).then_some(SessionEvent::PollTick)
            },
            TimerEvent::ReconnectDue { generation } => {
                let current = self.reconnect.as_ref().map(ReconnectTimer::generation);
                if current != Some(generation) {
                    tracing::trace!(generation, ?current, "dropping stale reconnect");
                    return None;
                }
                self.reconnect = None;
                Some(SessionEvent::ReconnectDue)
            },
        }
    }

    fn execute(&mut self, actions: Vec<SessionAction>) -> Result<(), RuntimeError> {
        for action in actions {
            match action {
                SessionAction::OpenChannel { address } => self.open_channel(address),
                SessionAction::SendFrame(text) => match &self.channel {
                    Some(channel) => {
                        if let Err(e) = channel.send(text) {
                            tracing::warn!(channel = channel.id(), error = %e, "frame not sent");
                        }
                    },
                    None => tracing::warn!("frame not sent: no channel"),
                },
                SessionAction::CloseChannel => self.close_channel(),
                SessionAction::UpdateRoom { id, patch } => self.update_room(id, patch),
                SessionAction::StartPolling => {
                    let interval = self.session.sync_config().poll_interval;
                    self.next_poll += 1;
                    let tx = self.timer_tx.clone();
                    self.poll =
                        Some(PollTask::spawn(self.env.clone(), interval, self.next_poll, tx));
                },
                SessionAction::StopPolling => self.poll = None,
                SessionAction::DestroyPlayer => self.session.destroy_player(),
                SessionAction::ScheduleReconnect { delay } => {
                    self.next_reconnect += 1;
                    let tx = self.timer_tx.clone();
                    self.reconnect = Some(ReconnectTimer::spawn(
                        self.env.clone(),
                        delay,
                        self.next_reconnect,
                        tx,
                    ));
                },
                SessionAction::Render => {
                    self.driver.render(&self.session).map_err(RuntimeError::driver)?;
                },
            }
        }
        Ok(())
    }

    fn open_channel(&mut self, address: String) {
        self.close_channel();
        self.reconnect = None;
        self.next_channel += 1;
        tracing::debug!(channel = self.next_channel, %address, "opening channel");
        self.channel = Some(transport::open(self.next_channel, address, self.channel_tx.clone()));
    }

    fn close_channel(&mut self) {
        self.reconnect = None;
        if let Some(channel) = self.channel.take() {
            self.closing.push(channel.close());
        }
    }

    fn update_room(&self, id: RoomId, patch: RoomPatch) {
        let rooms = Arc::clone(&self.rooms);
        tokio::spawn(async move {
            match rooms.update(id, &patch).await {
                Ok(room) => tracing::debug!(room = %room.code, "room updated"),
                Err(e) => tracing::warn!(%id, error = %e, "room update failed"),
            }
        });
    }

    async fn shutdown(&mut self) {
        let actions = self.session.teardown();
        if let Err(e) = self.execute(actions) {
            tracing::warn!(error = %e, "render failed during teardown");
        }

        for handle in self.closing.drain(..) {
            if tokio::time::timeout(CLOSE_TIMEOUT, handle).await.is_err() {
                tracing::debug!("channel close timed out");
            }
        }
        self.driver.stop();
    }
}
