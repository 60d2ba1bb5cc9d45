//! Line commands.
//!
//! Lines starting with `/` are commands; anything else is sent as chat.

use cowatch_client::DriverInput;
use cowatch_core::SessionEvent;
use thiserror::Error;

/// Help text listing every command.
pub const HELP: &str = "\
commands:
  /play /pause /toggle   control playback
  /seek SECONDS          jump to a position
  /url LINK              change the video
  /ready                 report the player as loaded
  /quit                  leave the room
anything else is sent as chat";

/// A line that could not be turned into input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Not a known command.
    #[error("unknown command /{0} (try /help)")]
    Unknown(String),

    /// Known command, wrong arguments.
    #[error("usage: {0}")]
    Usage(&'static str),

    /// `/help` was requested.
    #[error("{}", HELP)]
    Help,
}

/// Parse one input line.
///
/// Returns `Ok(None)` for blank lines.
pub fn parse(line: &str) -> Result<Option<DriverInput>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let Some(command) = line.strip_prefix('/') else {
        return Ok(Some(session(SessionEvent::SendChat { message: line.to_string() })));
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or("");
    let rest: Vec<&str> = parts.collect();

    let event = match (name, rest.as_slice()) {
        ("play", []) => SessionEvent::Play,
        ("pause", []) => SessionEvent::Pause,
        ("toggle", []) => SessionEvent::TogglePlayback,
        ("ready", []) => SessionEvent::PlayerReady,
        ("quit" | "exit", []) => return Ok(Some(DriverInput::Quit)),
        ("help", _) => return Err(CommandError::Help),
        ("seek", [seconds]) => match seconds.parse::<f64>() {
            Ok(seconds) if seconds.is_finite() => SessionEvent::Seek { seconds },
            _ => return Err(CommandError::Usage("/seek SECONDS")),
        },
        ("seek", _) => return Err(CommandError::Usage("/seek SECONDS")),
        ("url", [url]) => SessionEvent::SetVideoUrl { url: (*url).to_string() },
        ("url", _) => return Err(CommandError::Usage("/url LINK")),
        ("play" | "pause" | "toggle" | "ready" | "quit" | "exit", _) => {
            return Err(CommandError::Usage("command takes no arguments"));
        },
        (other, _) => return Err(CommandError::Unknown(other.to_string())),
    };

    Ok(Some(session(event)))
}

fn session(event: SessionEvent) -> DriverInput {
    DriverInput::Session(event)
}
