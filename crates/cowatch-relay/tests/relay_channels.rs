//! Relay behaviour over real loopback WebSockets.

use std::time::Duration;

use cowatch_proto::{Envelope, VideoAction};
use cowatch_relay::{RelayConfig, RelayServer};
use futures_util::{SinkExt, StreamExt};
use tokio::{io::AsyncReadExt, net::TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_relay() -> String {
    let config = RelayConfig { bind_address: "127.0.0.1:0".into(), ..RelayConfig::default() };
    let server = RelayServer::bind(config).await.unwrap();
    let address = server.local_addr().unwrap();
    tokio::spawn(server.run());
    format!("ws://{address}")
}

async fn connect(base: &str, room: &str) -> Client {
    let (client, _) = connect_async(format!("{base}/ws/room/{room}/")).await.unwrap();
    client
}

async fn send(client: &mut Client, envelope: &Envelope) {
    client.send(Message::text(envelope.encode().unwrap())).await.unwrap();
}

async fn recv(client: &mut Client) -> Envelope {
    let next = tokio::time::timeout(Duration::from_secs(5), client.next()).await.unwrap();
    match next {
        Some(Ok(Message::Text(text))) => Envelope::decode(text.as_str()).unwrap(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn join_chat_and_leave() {
    let base = start_relay().await;
    let mut alice = connect(&base, "movienight").await;
    send(&mut alice, &Envelope::join("alice")).await;
    assert_eq!(recv(&mut alice).await, Envelope::UserJoined {
        username: "alice".into(),
        online_count: 1
    });

    // Own announcement confirms bob is registered before anyone else speaks
    let mut bob = connect(&base, "movienight").await;
    send(&mut bob, &Envelope::join("bob")).await;
    let joined = Envelope::UserJoined { username: "bob".into(), online_count: 2 };
    assert_eq!(recv(&mut bob).await, joined);
    assert_eq!(recv(&mut alice).await, joined);

    let chat = Envelope::chat("popcorn ready", "bob");
    send(&mut bob, &chat).await;
    assert_eq!(recv(&mut alice).await, chat);
    assert_eq!(recv(&mut bob).await, chat);

    bob.close(None).await.unwrap();
    assert_eq!(recv(&mut alice).await, Envelope::UserLeft {
        username: "bob".into(),
        online_count: 1
    });
}

#[tokio::test]
async fn playback_echoes_to_sender_and_stays_in_room() {
    let base = start_relay().await;
    let mut alice = connect(&base, "abc").await;
    let mut other_room = connect(&base, "xyz").await;

    let play = Envelope::video_action(VideoAction::Play, "alice");
    send(&mut alice, &play).await;
    assert_eq!(recv(&mut alice).await, play);

    let ping = Envelope::chat("anyone?", "carol");
    send(&mut other_room, &ping).await;
    assert_eq!(recv(&mut other_room).await, ping);
}

#[tokio::test]
async fn malformed_frames_are_ignored() {
    let base = start_relay().await;
    let mut alice = connect(&base, "abc").await;

    alice.send(Message::text("{not json")).await.unwrap();
    let seek = Envelope::seek(42.0, "alice");
    send(&mut alice, &seek).await;

    assert_eq!(recv(&mut alice).await, seek);
}

#[tokio::test]
async fn unknown_path_is_rejected() {
    let base = start_relay().await;

    assert!(connect_async(format!("{base}/not/a/room")).await.is_err());
}

#[tokio::test]
async fn stalled_handshake_holds_a_slot_until_it_times_out() {
    let config = RelayConfig {
        bind_address: "127.0.0.1:0".into(),
        max_connections: 1,
        handshake_timeout: Duration::from_millis(500),
    };
    let server = RelayServer::bind(config).await.unwrap();
    let address = server.local_addr().unwrap();
    tokio::spawn(server.run());
    let url = format!("ws://{address}/ws/room/abc/");

    // Never sends the upgrade request
    let mut stalled = TcpStream::connect(address).await.unwrap();
    assert!(connect_async(url.as_str()).await.is_err());

    let mut buf = [0u8; 1];
    let read = tokio::time::timeout(Duration::from_secs(5), stalled.read(&mut buf)).await.unwrap();
    assert!(matches!(read, Ok(0) | Err(_)));

    // The slot is released once the stalled connection's task has finished
    let mut admitted = false;
    for _ in 0..50 {
        if connect_async(url.as_str()).await.is_ok() {
            admitted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(admitted);
}
