//! Cowatch terminal client.
//!
//! # Usage
//!
//! ```bash
//! # Room known only to the relay
//! cowatch --server ws://localhost:8000 --room movienight --username alice
//!
//! # Room looked up through the REST API
//! cowatch --api http://localhost:8000/api/ --room-id 7 --username alice --token "$TOKEN"
//! ```

use clap::Parser;
use cowatch_cli::{ConsoleDriver, ConsolePlayer};
use cowatch_client::{
    HttpRoomService, MemoryRoomService, RoomSelector, RoomService, Runtime, SystemEnv, enter_room,
};
use cowatch_core::{ReconnectPolicy, RoomSession, SessionConfig};
use cowatch_proto::{RoomId, RoomInfo};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Cowatch terminal client
#[derive(Parser, Debug)]
#[command(name = "cowatch")]
#[command(about = "Watch videos in sync with a room from the terminal")]
#[command(version)]
struct Args {
    /// Relay or server base address
    #[arg(short, long, env = "COWATCH_SERVER", default_value = "ws://127.0.0.1:8000")]
    server: String,

    /// Room invite code
    #[arg(short, long, env = "COWATCH_ROOM", required_unless_present = "room_id")]
    room: Option<String>,

    /// Room id in the REST API
    #[arg(long, requires = "api", conflicts_with = "room")]
    room_id: Option<u64>,

    /// Display name in the room
    #[arg(short, long, env = "COWATCH_USERNAME")]
    username: String,

    /// REST API base for room lookup and video persistence
    #[arg(long, env = "COWATCH_API")]
    api: Option<String>,

    /// Bearer token for the REST API
    #[arg(long, env = "COWATCH_TOKEN", requires = "api")]
    token: Option<String>,

    /// Initial video for a room without REST API
    #[arg(long, conflicts_with = "api")]
    video: Option<String>,

    /// Reconnect attempts after an unexpected disconnect (0 disables)
    #[arg(long, default_value = "0")]
    reconnect: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout belongs to the room view
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let selector = match (args.room_id, &args.room) {
        (Some(id), _) => RoomSelector::Id(RoomId(id)),
        (None, Some(code)) => RoomSelector::Code(code.clone()),
        (None, None) => return Err("either --room or --room-id is required".into()),
    };

    match (&args.api, &selector) {
        (Some(api), _) => {
            let mut rooms = HttpRoomService::new(api)?;
            if let Some(token) = &args.token {
                rooms = rooms.with_token(token.clone());
            }
            run(&args, rooms, &selector).await
        },
        (None, RoomSelector::Code(code)) => {
            let rooms = MemoryRoomService::with_room(RoomInfo {
                id: RoomId(0),
                code: code.clone(),
                name: code.clone(),
                owner: None,
                youtube_url: args.video.clone(),
            });
            run(&args, rooms, &selector).await
        },
        (None, RoomSelector::Id(_)) => Err("--room-id requires --api".into()),
    }
}

async fn run<R: RoomService>(
    args: &Args,
    rooms: R,
    selector: &RoomSelector,
) -> Result<(), Box<dyn std::error::Error>> {
    let (room, address) = enter_room(&rooms, selector, &args.server).await?;
    tracing::debug!(room = %room.code, "starting runtime");

    let config = SessionConfig {
        reconnect: ReconnectPolicy::backoff(args.reconnect),
        ..SessionConfig::new(args.username.clone())
    };
    let session = RoomSession::new(room, address.as_str(), ConsolePlayer::new(), config);

    Runtime::new(ConsoleDriver::stdio(), SystemEnv::new(), rooms, session).run().await?;
    Ok(())
}
