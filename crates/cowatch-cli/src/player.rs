//! Simulated player for headless use.
//!
//! Tracks a position that advances in real time while playing. There is no
//! embed to load, so readiness is reported by the user with `/ready`.

#![allow(clippy::disallowed_methods, reason = "The simulated player is its own clock")]

use std::time::Instant;

use cowatch_core::Player;

/// Player with a simulated clock.
#[derive(Debug, Default)]
pub struct ConsolePlayer {
    video_id: Option<String>,
    /// Position when playback last started or the player was last sought
    position: f64,
    /// Set while playing
    resumed_at: Option<Instant>,
    destroyed: bool,
}

impl ConsolePlayer {
    /// Player with nothing loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loaded video, if any.
    pub fn video_id(&self) -> Option<&str> {
        self.video_id.as_deref()
    }

    /// Whether the simulated clock is running.
    pub fn is_playing(&self) -> bool {
        self.resumed_at.is_some()
    }

    /// Whether the player has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Position at `now`. `None` if nothing is loaded.
    pub fn position_at(&self, now: Instant) -> Option<f64> {
        self.video_id.as_ref()?;
        let elapsed =
            self.resumed_at.map_or(0.0, |since| now.saturating_duration_since(since).as_secs_f64());
        Some(self.position + elapsed)
    }

    fn freeze(&mut self, now: Instant) {
        if let Some(position) = self.position_at(now) {
            self.position = position;
        }
        self.resumed_at = None;
    }
}

impl Player for ConsolePlayer {
    fn load(&mut self, video_id: &str) {
        tracing::debug!(%video_id, "player loading");
        self.video_id = Some(video_id.to_string());
        self.position = 0.0;
        self.resumed_at = None;
    }

    fn play(&mut self) {
        if self.video_id.is_some() && self.resumed_at.is_none() {
            self.resumed_at = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        self.freeze(Instant::now());
    }

    fn seek_to(&mut self, seconds: f64) {
        let playing = self.is_playing();
        self.position = seconds.max(0.0);
        self.resumed_at = playing.then(Instant::now);
    }

    fn current_time(&self) -> Option<f64> {
        self.position_at(Instant::now())
    }

    fn destroy(&mut self) {
        self.video_id = None;
        self.resumed_at = None;
        self.destroyed = true;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn position_advances_only_while_playing() {
        let mut player = ConsolePlayer::new();
        assert_eq!(player.current_time(), None);

        player.load("dQw4w9WgXcQ");
        let start = Instant::now();
        assert_eq!(player.position_at(start + Duration::from_secs(5)), Some(0.0));

        player.play();
        let later = Instant::now() + Duration::from_secs(3);
        assert!(player.position_at(later).is_some_and(|p| (3.0..3.5).contains(&p)));
    }

    #[test]
    fn seek_keeps_play_state() {
        let mut player = ConsolePlayer::new();
        player.load("dQw4w9WgXcQ");

        player.seek_to(42.0);
        assert!(!player.is_playing());
        assert_eq!(player.current_time(), Some(42.0));

        player.play();
        player.seek_to(-5.0);
        assert!(player.is_playing());
        assert!(player.current_time().is_some_and(|p| p < 1.0));
    }

    #[test]
    fn pause_freezes_position() {
        let mut player = ConsolePlayer::new();
        player.load("dQw4w9WgXcQ");
        player.seek_to(10.0);
        player.play();
        player.pause();

        let frozen = player.current_time();
        assert_eq!(player.position_at(Instant::now() + Duration::from_secs(60)), frozen);
    }

    #[test]
    fn destroy_unloads() {
        let mut player = ConsolePlayer::new();
        player.load("dQw4w9WgXcQ");
        player.destroy();

        assert!(player.is_destroyed());
        assert_eq!(player.current_time(), None);
    }
}
