//! Property-based tests for the synchronization core.
//!
//! Echo suppression, chat ordering, seek detection and the session's polling
//! invariant must hold for arbitrary inputs and event sequences.

mod common;

use std::time::Duration;

use common::{ScriptedPlayer, VIDEO_URL, VirtualInstant, ready_session};
use cowatch_core::{
    ConnectionState, PlaybackAction, PlaybackPhase, PlayerStateChange, Reconciler, SessionAction,
    SessionEvent, SyncConfig, should_apply,
    proto::{Envelope, VideoAction},
};
use proptest::prelude::*;

fn username() -> BoxedStrategy<String> {
    prop_oneof![Just("alice".to_string()), Just("bob".to_string()), "[a-z]{1,8}"].boxed()
}

fn playback_envelope(user: BoxedStrategy<String>) -> impl Strategy<Value = Envelope> {
    prop_oneof![
        (user.clone(), any::<bool>()).prop_map(|(username, play)| {
            Envelope::video_action(VideoAction::from_playing(play), username)
        }),
        (user.clone(), 0u32..40_000)
            .prop_map(|(username, q)| Envelope::seek(f64::from(q) / 4.0, username)),
        (user, "[a-zA-Z0-9_-]{11}").prop_map(|(username, id)| {
            Envelope::video_url_changed(format!("https://youtu.be/{id}"), username)
        }),
    ]
}

fn chat_or_presence() -> impl Strategy<Value = Envelope> {
    prop_oneof![
        (username(), ".{0,40}").prop_map(|(username, text)| Envelope::chat(text, username)),
        (username(), 0u32..100)
            .prop_map(|(username, online_count)| Envelope::UserJoined { username, online_count }),
        (username(), 0u32..100)
            .prop_map(|(username, online_count)| Envelope::UserLeft { username, online_count }),
    ]
}

fn frame(envelope: &Envelope) -> SessionEvent {
    SessionEvent::FrameReceived(envelope.encode().unwrap_or_default())
}

fn session_event() -> impl Strategy<Value = SessionEvent> {
    prop_oneof![
        1 => Just(SessionEvent::ChannelOpened),
        1 => Just(SessionEvent::ChannelClosed),
        1 => Just(SessionEvent::ReconnectDue),
        4 => Just(SessionEvent::PollTick),
        1 => Just(SessionEvent::PlayerReady),
        1 => Just(SessionEvent::PlayerStateChanged(PlayerStateChange::Playing)),
        1 => Just(SessionEvent::PlayerStateChanged(PlayerStateChange::Paused)),
        1 => Just(SessionEvent::Play),
        1 => Just(SessionEvent::Pause),
        1 => Just(SessionEvent::TogglePlayback),
        1 => (0u32..4000).prop_map(|s| SessionEvent::Seek { seconds: f64::from(s) / 4.0 }),
        1 => ".{0,20}".prop_map(|message| SessionEvent::SendChat { message }),
        1 => Just(SessionEvent::SetVideoUrl { url: VIDEO_URL.to_string() }),
        2 => playback_envelope(username()).prop_map(|e| frame(&e)),
        2 => chat_or_presence().prop_map(|e| frame(&e)),
    ]
}

fn ready_reconciler(
    now: VirtualInstant,
) -> (Reconciler<ScriptedPlayer, VirtualInstant>, ScriptedPlayer) {
    let player = ScriptedPlayer::default();
    let mut reconciler = Reconciler::new(player.clone(), "alice", SyncConfig::default());
    let _ = reconciler.restore_url(VIDEO_URL);
    let _ = reconciler.player_ready(now);
    (reconciler, player)
}

proptest! {
    #[test]
    fn prop_own_playback_envelopes_are_suppressed(
        envelope in playback_envelope(Just("alice".to_string()).boxed()),
        repeats in 1usize..5,
    ) {
        prop_assert!(!should_apply(&envelope, "alice"));

        let t0 = VirtualInstant::at_millis(0);
        let (mut session, player) = ready_session("alice", t0);
        let before = (session.playback().clone(), session.phase(), player.calls());

        for _ in 0..repeats {
            let actions = session.handle(frame(&envelope), t0.after(Duration::from_secs(5)));
            prop_assert!(actions.is_empty());
        }

        prop_assert_eq!(before, (session.playback().clone(), session.phase(), player.calls()));
    }

    #[test]
    fn prop_chat_and_presence_always_apply(
        local in username(),
        envelopes in prop::collection::vec(chat_or_presence(), 1..20),
    ) {
        let t0 = VirtualInstant::at_millis(0);
        let (mut session, _) = ready_session(&local, t0);

        for envelope in &envelopes {
            prop_assert!(should_apply(envelope, &local));
            let actions = session.handle(frame(envelope), t0);
            prop_assert_eq!(actions, vec![SessionAction::Render]);
        }

        prop_assert_eq!(session.chat_log().len(), envelopes.len());
        let last_count = envelopes.iter().rev().find_map(|e| match e {
            Envelope::UserJoined { online_count, .. } | Envelope::UserLeft { online_count, .. } => {
                Some(*online_count)
            },
            _ => None,
        });
        prop_assert_eq!(session.online_count(), last_count.unwrap_or(0));
    }

    #[test]
    fn prop_chat_log_preserves_receive_order(
        messages in prop::collection::vec(".{0,30}", 0..30),
    ) {
        let t0 = VirtualInstant::at_millis(0);
        let (mut session, _) = ready_session("alice", t0);

        for (i, message) in messages.iter().enumerate() {
            let author = if i % 2 == 0 { "bob" } else { "alice" };
            let envelope = Envelope::chat(message.clone(), author);
            let _ = session.handle(frame(&envelope), t0);
        }

        let log: Vec<&str> = session.chat_log().iter().map(|line| line.text.as_str()).collect();
        let expected: Vec<&str> = messages.iter().map(String::as_str).collect();
        prop_assert_eq!(log, expected);
    }

    #[test]
    fn prop_seek_detected_only_above_threshold(start in 0u32..4000, jump in 0u32..40) {
        let t0 = VirtualInstant::at_millis(0);
        let (mut reconciler, player) = ready_reconciler(t0);
        let start = f64::from(start) / 4.0;
        let delta = f64::from(jump) / 4.0;

        player.set_position(start);
        let _ = reconciler.poll(t0.after(Duration::from_secs(2)));
        player.set_position(start + delta);
        let actions = reconciler.poll(t0.after(Duration::from_millis(2500)));

        let expected = PlaybackAction::Broadcast(Envelope::seek(start + delta, "alice"));
        let seeked = actions.contains(&expected);
        prop_assert_eq!(seeked, delta > 1.0);
        prop_assert_eq!(actions.len(), usize::from(seeked));
    }

    #[test]
    fn prop_poll_inside_guard_never_broadcasts(
        target in 0u32..40_000,
        reported in 0u32..40_000,
        offset_ms in 0u64..500,
    ) {
        let t0 = VirtualInstant::at_millis(0);
        let (mut reconciler, player) = ready_reconciler(t0);
        let t1 = t0.after(Duration::from_secs(10));

        let seek = Envelope::seek(f64::from(target) / 4.0, "bob");
        let _ = reconciler.apply_remote(&seek, t1).unwrap();
        player.set_position(f64::from(reported) / 4.0);

        let now = t1.after(Duration::from_millis(offset_ms));
        prop_assert!(reconciler.is_applying_remote(now));
        prop_assert!(reconciler.poll(now).is_empty());
        prop_assert!(reconciler.player_state_changed(PlayerStateChange::Paused, now).is_empty());
        prop_assert!(reconciler.player_state_changed(PlayerStateChange::Playing, now).is_empty());
    }

    #[test]
    fn prop_session_invariants_hold(
        events in prop::collection::vec(session_event(), 0..60),
    ) {
        let mut now = VirtualInstant::at_millis(0);
        let (mut session, player) = ready_session("alice", now);

        for event in events {
            now = now.after(Duration::from_millis(250));
            let actions = session.handle(event, now);

            // Polling only while a video is ready on an open channel
            let ready = matches!(session.phase(), PlaybackPhase::VideoReady { .. });
            let open = session.connection_state() == ConnectionState::Open;
            prop_assert_eq!(session.is_polling(), ready && open);

            // Nothing is sent while the channel is not open
            if !open {
                prop_assert!(!actions.iter().any(|a| matches!(a, SessionAction::SendFrame(_))));
            }

            if let PlaybackPhase::VideoReady { is_playing } = session.phase() {
                prop_assert_eq!(is_playing, session.playback().is_playing);
                prop_assert!(!player.is_destroyed());
            }
        }
    }
}

#[test]
fn threshold_boundary() {
    let t0 = VirtualInstant::at_millis(0);

    let (mut exact, player) = ready_reconciler(t0);
    player.set_position(1.0);
    assert!(exact.poll(t0.after(Duration::from_secs(2))).is_empty());

    let (mut over, player) = ready_reconciler(t0);
    player.set_position(1.01);
    assert_eq!(over.poll(t0.after(Duration::from_secs(2))), vec![PlaybackAction::Broadcast(
        Envelope::seek(1.01, "alice")
    )]);
}

#[test]
fn url_without_video_id_still_enters_loading() {
    let player = ScriptedPlayer::default();
    let mut reconciler: Reconciler<_, VirtualInstant> =
        Reconciler::new(player.clone(), "alice", SyncConfig::default());

    let _ = reconciler.local_set_url("https://vimeo.com/12345");

    assert_eq!(reconciler.phase(), PlaybackPhase::VideoLoading);
    assert_eq!(reconciler.state().video_id, None);
    assert!(player.calls().is_empty());
}
