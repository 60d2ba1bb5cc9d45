//! Line-oriented console driver.
//!
//! Implements [`Driver`] over a queue of input lines and any [`Write`] sink.
//! Rendering is incremental: each render prints only what changed since the
//! previous one (new chat lines, presence, playback and status).

use std::{
    io::{self, Stdout, Write},
    time::Instant,
};

use cowatch_client::{Driver, DriverInput};
use cowatch_core::{PlaybackPhase, RoomSession};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    sync::mpsc,
    task::JoinHandle,
};

use crate::{command, player::ConsolePlayer};

/// Console driver errors.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Writing to the console failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Forward lines from `reader` until it ends or the receiver is dropped.
pub fn spawn_line_reader<R>(reader: R, lines: mpsc::Sender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader).lines();
        loop {
            match reader.next_line().await {
                Ok(Some(line)) => {
                    if lines.send(line).await.is_err() {
                        break;
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "input closed");
                    break;
                },
            }
        }
    })
}

/// What the console currently shows.
#[derive(Debug, Default)]
struct Shown {
    room: Option<String>,
    chat_lines: usize,
    online: Option<u32>,
    phase: Option<PlaybackPhase>,
    status: Option<String>,
}

/// Console driver.
pub struct ConsoleDriver<W = Stdout> {
    lines: mpsc::Receiver<String>,
    out: W,
    shown: Shown,
}

impl ConsoleDriver<Stdout> {
    /// Driver reading commands from stdin and printing to stdout.
    pub fn stdio() -> Self {
        let (tx, rx) = mpsc::channel(64);
        spawn_line_reader(tokio::io::stdin(), tx);
        Self::new(rx, io::stdout())
    }
}

impl<W: Write> ConsoleDriver<W> {
    /// Driver over an existing line queue and output sink.
    pub fn new(lines: mpsc::Receiver<String>, out: W) -> Self {
        Self { lines, out, shown: Shown::default() }
    }

    /// Output sink.
    pub fn output(&self) -> &W {
        &self.out
    }

    fn show_changes(
        &mut self,
        session: &RoomSession<ConsolePlayer, Instant>,
    ) -> Result<(), ConsoleError> {
        let room = session.room();
        if self.shown.room.as_deref() != Some(room.code.as_str()) {
            writeln!(self.out, "== {} ({}) as {} ==", room.name, room.code, session.username())?;
            self.shown = Shown { room: Some(room.code.clone()), ..Shown::default() };
        }

        let log = session.chat_log();
        if log.len() < self.shown.chat_lines {
            self.shown.chat_lines = 0;
        }
        for line in &log[self.shown.chat_lines..] {
            if line.is_system {
                writeln!(self.out, "* {}", line.text)?;
            } else {
                writeln!(self.out, "<{}> {}", line.username, line.text)?;
            }
        }
        self.shown.chat_lines = log.len();

        let online = session.online_count();
        if self.shown.online != Some(online) && !log.is_empty() {
            writeln!(self.out, "   {online} online")?;
            self.shown.online = Some(online);
        }

        let phase = session.phase();
        if self.shown.phase != Some(phase) {
            let playback = session.playback();
            match phase {
                PlaybackPhase::NoVideo => {
                    writeln!(self.out, "-- no video (/url LINK to pick one)")?;
                },
                PlaybackPhase::VideoLoading => {
                    let video = playback
                        .video_id
                        .as_deref()
                        .or(playback.video_url.as_deref())
                        .unwrap_or("video");
                    writeln!(self.out, "-- loading {video} (/ready when loaded)")?;
                },
                PlaybackPhase::VideoReady { is_playing } => {
                    let state = if is_playing { "playing" } else { "paused" };
                    writeln!(self.out, "-- {state} at {:.1}s", playback.last_known_time)?;
                },
            }
            self.shown.phase = Some(phase);
        }

        let status = session.status_message().map(str::to_string);
        if let Some(text) = &status
            && self.shown.status != status
        {
            writeln!(self.out, "-- {text}")?;
        }
        self.shown.status = status;

        Ok(())
    }
}

impl<W: Write + Send> Driver for ConsoleDriver<W> {
    type Error = ConsoleError;
    type Player = ConsolePlayer;
    type Instant = Instant;

    fn next_input(&mut self) -> impl Future<Output = Result<DriverInput, ConsoleError>> + Send {
        async move {
            loop {
                let Some(line) = self.lines.recv().await else {
                    return Ok(DriverInput::Quit);
                };
                match command::parse(&line) {
                    Ok(Some(input)) => return Ok(input),
                    Ok(None) => {},
                    Err(e) => {
                        writeln!(self.out, "{e}")?;
                        self.out.flush()?;
                    },
                }
            }
        }
    }

    fn render(
        &mut self,
        session: &RoomSession<ConsolePlayer, Instant>,
    ) -> Result<(), ConsoleError> {
        self.show_changes(session)?;
        self.out.flush()?;
        Ok(())
    }

    fn stop(&mut self) {
        let _ = writeln!(self.out, "-- left room");
        let _ = self.out.flush();
    }
}
