//! Headless terminal client for cowatch rooms
//!
//! A thin shell over [`cowatch_client::Driver`] that reads slash commands
//! from stdin and prints the room view as text. All orchestration lives in
//! the generic [`cowatch_client::Runtime`].
//!
//! # Components
//!
//! - [`ConsoleDriver`]: line input and incremental text rendering
//! - [`ConsolePlayer`]: simulated player whose position advances in real
//!   time
//! - [`command`]: slash command parsing

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
mod console;
mod player;

pub use console::{ConsoleDriver, ConsoleError, spawn_line_reader};
pub use player::ConsolePlayer;
