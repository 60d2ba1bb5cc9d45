//! WebSocket transport for room channels.
//!
//! Each channel runs in its own task. Outbound frames go through the
//! [`ChannelHandle`]; lifecycle changes and inbound frames come back as
//! [`ChannelEvent`]s on a shared queue, tagged with the channel id so events
//! from a replaced channel can be told apart.
//!
//! Failures never surface to senders beyond [`TransportError::Closed`]: the
//! task reports them as [`ChannelEventKind::Error`] and exits.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::error::TransportError;

/// Time allowed for the TCP connect and WebSocket handshake together.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Identifies one channel for the lifetime of a runtime.
pub type ChannelId = u64;

/// What happened on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEventKind {
    /// Handshake completed
    Opened,
    /// Text frame received
    Frame(String),
    /// Closed by either side
    Closed,
    /// Transport failure. The channel is gone.
    Error(String),
}

/// Event reported by a channel task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEvent {
    /// Channel that produced the event
    pub channel: ChannelId,
    /// What happened
    pub kind: ChannelEventKind,
}

#[derive(Debug)]
enum Outbound {
    Frame(String),
    Close,
}

/// Handle to a channel task.
#[derive(Debug)]
pub struct ChannelHandle {
    id: ChannelId,
    address: String,
    outbound: mpsc::UnboundedSender<Outbound>,
    task: JoinHandle<()>,
}

impl ChannelHandle {
    /// Channel id carried by this channel's events.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Address the channel was opened to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Queue a text frame.
    ///
    /// Frames queued before the handshake completes are sent once it does.
    ///
    /// # Errors
    ///
    /// - `TransportError::Closed` if the channel task has exited
    pub fn send(&self, text: String) -> Result<(), TransportError> {
        self.outbound.send(Outbound::Frame(text)).map_err(|_| TransportError::Closed)
    }

    /// Close the channel gracefully.
    ///
    /// Returns the task handle so callers can wait for the close frame to be
    /// flushed.
    pub fn close(self) -> JoinHandle<()> {
        let _ = self.outbound.send(Outbound::Close);
        self.task
    }

    /// Drop the connection without a close handshake.
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Open a channel to `address` in a new task with
/// [`DEFAULT_CONNECT_TIMEOUT`].
///
/// Must be called from within a Tokio runtime. Events are delivered on
/// `events`; the first is either `Opened` or `Error`.
pub fn open(
    id: ChannelId,
    address: impl Into<String>,
    events: mpsc::Sender<ChannelEvent>,
) -> ChannelHandle {
    open_with_timeout(id, address, DEFAULT_CONNECT_TIMEOUT, events)
}

/// Like [`open`], reporting `Error` if the handshake has not completed
/// within `connect_timeout`.
pub fn open_with_timeout(
    id: ChannelId,
    address: impl Into<String>,
    connect_timeout: Duration,
    events: mpsc::Sender<ChannelEvent>,
) -> ChannelHandle {
    let address = address.into();
    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    let task =
        tokio::spawn(run_channel(id, address.clone(), connect_timeout, outbound_rx, events));

    ChannelHandle { id, address, outbound, task }
}

async fn run_channel(
    id: ChannelId,
    address: String,
    connect_timeout: Duration,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::Sender<ChannelEvent>,
) {
    let event = |kind| ChannelEvent { channel: id, kind };

    let handshake = tokio::time::timeout(connect_timeout, connect_async(address.as_str()));
    let connected = match handshake.await {
        Ok(connected) => connected.map_err(|e| e.to_string()),
        Err(_) => Err(format!("timed out after {connect_timeout:?}")),
    };
    let stream = match connected {
        Ok((stream, _response)) => stream,
        Err(reason) => {
            let error = TransportError::Connect { address, reason };
            tracing::warn!(channel = id, %error, "channel open failed");
            let _ = events.send(event(ChannelEventKind::Error(error.to_string()))).await;
            return;
        },
    };

    tracing::debug!(channel = id, %address, "channel open");
    if events.send(event(ChannelEventKind::Opened)).await.is_err() {
        return;
    }

    let (mut writer, mut reader) = stream.split();
    let end = loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Frame(text)) => {
                    if let Err(e) = writer.send(Message::text(text)).await {
                        break stream_error(&e);
                    }
                },
                Some(Outbound::Close) | None => {
                    let _ = writer.close().await;
                    break ChannelEventKind::Closed;
                },
            },
            incoming = reader.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let frame = ChannelEventKind::Frame(text.as_str().to_owned());
                    if events.send(event(frame)).await.is_err() {
                        let _ = writer.close().await;
                        break ChannelEventKind::Closed;
                    }
                },
                Some(Ok(Message::Close(_))) | None => break ChannelEventKind::Closed,
                Some(Ok(other)) => {
                    tracing::trace!(channel = id, kind = ?other, "ignoring non-text message");
                },
                Some(Err(e)) => break stream_error(&e),
            },
        }
    };

    tracing::debug!(channel = id, outcome = ?end, "channel finished");
    let _ = events.send(event(end)).await;
}

fn stream_error(error: &impl std::fmt::Display) -> ChannelEventKind {
    ChannelEventKind::Error(TransportError::Stream(error.to_string()).to_string())
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn silent_server_times_out_with_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        // Accepts TCP but never answers the upgrade request
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(stream);
        });

        let (tx, mut rx) = mpsc::channel(4);
        let _channel = open_with_timeout(
            7,
            format!("ws://{address}/ws/room/abc/"),
            Duration::from_millis(200),
            tx,
        );

        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(first.channel, 7);
        assert!(matches!(&first.kind, ChannelEventKind::Error(reason) if reason.contains("timed out")));
        server.abort();
    }
}
