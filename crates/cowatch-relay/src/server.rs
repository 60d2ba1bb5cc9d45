//! WebSocket relay server.
//!
//! Accepts connections on `/ws/room/<code>/`, feeds them into
//! [`RelayRooms`] and delivers the resulting frames. Each connection gets
//! its own task and an unbounded outbound queue, so a slow reader never
//! blocks the room.

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{Mutex, Semaphore, mpsc},
};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        Message,
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
    },
};

use crate::{
    error::RelayError,
    rooms::{ConnectionId, RelayAction, RelayRooms},
};

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind to (e.g., "0.0.0.0:8000")
    pub bind_address: String,
    /// Maximum concurrent connections across all rooms, counted from
    /// accept, handshakes in progress included
    pub max_connections: usize,
    /// How long a client may take to complete the WebSocket handshake
    pub handshake_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            max_connections: 10_000,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// Room code from a channel path, e.g. `/ws/room/abc123/`.
///
/// The trailing slash is optional. Returns `None` for any other path.
pub fn room_code_from_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/ws/room/")?;
    let code = rest.strip_suffix('/').unwrap_or(rest);
    let valid = !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(code)
}

/// Shared relay state.
#[derive(Debug, Default)]
struct Hub {
    rooms: RelayRooms,
    outbound: HashMap<ConnectionId, mpsc::UnboundedSender<String>>,
    next_connection: ConnectionId,
}

impl Hub {
    fn execute(&self, actions: Vec<RelayAction>) {
        for action in actions {
            match action {
                RelayAction::Send { connection, frame } => {
                    let delivered =
                        self.outbound.get(&connection).is_some_and(|tx| tx.send(frame).is_ok());
                    if !delivered {
                        tracing::debug!(connection, "recipient already gone");
                    }
                },
            }
        }
    }
}

/// Relay server.
pub struct RelayServer {
    config: RelayConfig,
    listener: TcpListener,
    hub: Arc<Mutex<Hub>>,
}

impl RelayServer {
    /// Bind the listener.
    ///
    /// # Errors
    ///
    /// - `RelayError::Bind` if the address is invalid or in use
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(&config.bind_address)
            .await
            .map_err(|source| RelayError::Bind { address: config.bind_address.clone(), source })?;

        Ok(Self { config, listener, hub: Arc::default() })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails.
    ///
    /// # Errors
    ///
    /// - `RelayError::Io` if accepting fails with a non-transient error
    pub async fn run(self) -> Result<(), RelayError> {
        tracing::info!(address = %self.local_addr()?, "relay listening");
        let slots = Arc::new(Semaphore::new(self.config.max_connections));

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    let error = RelayError::from(e);
                    if error.is_transient() {
                        tracing::warn!(%error, "accept failed");
                        continue;
                    }
                    return Err(error);
                },
            };

            let Ok(slot) = Arc::clone(&slots).try_acquire_owned() else {
                tracing::warn!(%peer, "connection limit reached, rejecting");
                continue;
            };

            let connection = {
                let mut hub = self.hub.lock().await;
                hub.next_connection += 1;
                hub.next_connection
            };

            let hub = Arc::clone(&self.hub);
            let handshake_timeout = self.config.handshake_timeout;
            tokio::spawn(async move {
                let result = handle_connection(stream, peer, connection, handshake_timeout, hub);
                if let Err(e) = result.await {
                    tracing::debug!(connection, %peer, error = %e, "connection ended with error");
                }
                drop(slot);
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    connection: ConnectionId,
    handshake_timeout: Duration,
    hub: Arc<Mutex<Hub>>,
) -> Result<(), RelayError> {
    let mut room = None;
    let handshake = accept_hdr_async(stream, |request: &Request, response: Response| {
        match room_code_from_path(request.uri().path()) {
            Some(code) => {
                room = Some(code.to_string());
                Ok(response)
            },
            None => Err(not_found()),
        }
    });
    let ws = tokio::time::timeout(handshake_timeout, handshake)
        .await
        .map_err(|_| RelayError::HandshakeTimeout(handshake_timeout))??;

    let Some(room) = room else {
        return Ok(());
    };
    tracing::debug!(connection, %peer, %room, "websocket established");

    let (tx, mut outbound) = mpsc::unbounded_channel();
    {
        let mut hub = hub.lock().await;
        hub.outbound.insert(connection, tx);
        hub.rooms.connect(connection, room);
    }

    let (mut writer, mut reader) = ws.split();
    let result = loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if let Err(e) = writer.send(Message::text(text)).await {
                        break Err(RelayError::from(e));
                    }
                },
                None => break Ok(()),
            },
            incoming = reader.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let mut hub = hub.lock().await;
                    let actions = hub.rooms.frame(connection, text.as_str());
                    hub.execute(actions);
                },
                Some(Ok(Message::Close(_))) | None => break Ok(()),
                Some(Ok(_)) => {},
                Some(Err(e)) => break Err(RelayError::from(e)),
            },
        }
    };

    let mut hub = hub.lock().await;
    hub.outbound.remove(&connection);
    let actions = hub.rooms.disconnect(connection);
    hub.execute(actions);

    result
}

fn not_found() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("unknown channel path".to_string()));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}
