//! Shared fixtures for the synchronization core tests.

#![allow(dead_code)]

use std::{cell::RefCell, ops::Sub, rc::Rc, time::Duration};

use cowatch_core::{Player, RoomSession, SessionConfig, proto::RoomId, proto::RoomInfo};

/// Virtual monotonic time, in offsets from an arbitrary origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtualInstant(Duration);

impl VirtualInstant {
    pub fn at_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    pub fn after(self, elapsed: Duration) -> Self {
        Self(self.0 + elapsed)
    }
}

impl Sub for VirtualInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

/// Everything the scripted player was asked to do.
#[derive(Debug, Default)]
pub struct PlayerProbe {
    pub calls: Vec<String>,
    pub position: Option<f64>,
    pub playing: bool,
    pub destroyed: bool,
}

/// Player whose state stays observable after ownership moves into a session.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPlayer(Rc<RefCell<PlayerProbe>>);

impl ScriptedPlayer {
    /// Move the playhead as if the user dragged the scrubber.
    pub fn set_position(&self, seconds: f64) {
        self.0.borrow_mut().position = Some(seconds);
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.borrow().calls.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.0.borrow().playing
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.borrow().destroyed
    }
}

impl Player for ScriptedPlayer {
    fn load(&mut self, video_id: &str) {
        let mut probe = self.0.borrow_mut();
        probe.calls.push(format!("load:{video_id}"));
        probe.position = Some(0.0);
        probe.playing = false;
    }

    fn play(&mut self) {
        let mut probe = self.0.borrow_mut();
        probe.calls.push("play".to_string());
        probe.playing = true;
    }

    fn pause(&mut self) {
        let mut probe = self.0.borrow_mut();
        probe.calls.push("pause".to_string());
        probe.playing = false;
    }

    fn seek_to(&mut self, seconds: f64) {
        let mut probe = self.0.borrow_mut();
        probe.calls.push(format!("seek:{seconds}"));
        probe.position = Some(seconds);
    }

    fn current_time(&self) -> Option<f64> {
        self.0.borrow().position
    }

    fn destroy(&mut self) {
        let mut probe = self.0.borrow_mut();
        probe.calls.push("destroy".to_string());
        probe.destroyed = true;
    }
}

pub const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
pub const ROOM_ADDRESS: &str = "ws://localhost:8000/ws/room/movienight/";

pub fn movie_night() -> RoomInfo {
    RoomInfo {
        id: RoomId(7),
        code: "movienight".to_string(),
        name: "Movie night".to_string(),
        owner: None,
        youtube_url: Some(VIDEO_URL.to_string()),
    }
}

/// Session for `username` that is connected and has a ready, paused video.
pub fn ready_session(
    username: &str,
    now: VirtualInstant,
) -> (RoomSession<ScriptedPlayer, VirtualInstant>, ScriptedPlayer) {
    let player = ScriptedPlayer::default();
    let mut session =
        RoomSession::new(movie_night(), ROOM_ADDRESS, player.clone(), SessionConfig::new(username));

    let _ = session.open();
    let _ = session.handle(cowatch_core::SessionEvent::ChannelOpened, now);
    let _ = session.handle(cowatch_core::SessionEvent::PlayerReady, now);
    (session, player)
}
