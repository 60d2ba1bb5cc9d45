//! Cowatch relay binary.
//!
//! # Usage
//!
//! ```bash
//! cowatch-relay --bind 0.0.0.0:8000
//! ```

use std::time::Duration;

use clap::Parser;
use cowatch_relay::{RelayConfig, RelayServer};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Cowatch room relay
#[derive(Parser, Debug)]
#[command(name = "cowatch-relay")]
#[command(about = "Broadcast relay for cowatch room channels")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1:8000")]
    bind: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Seconds a client may take to complete the WebSocket handshake
    #[arg(long, default_value = "10")]
    handshake_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = RelayConfig {
        bind_address: args.bind,
        max_connections: args.max_connections,
        handshake_timeout: Duration::from_secs(args.handshake_timeout),
    };
    let server = RelayServer::bind(config).await?;
    server.run().await?;

    Ok(())
}
