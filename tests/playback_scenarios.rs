//! Integration tests for narration playback
//!
//! These tests drive the public API end to end with a manual clock and the
//! in-memory backend: timing maps, word tracking, transport transitions and
//! the background channel running alongside the narration.

use approx::assert_relative_eq;

use narration_engine::backend::memory::MemoryBackend;
use narration_engine::backend::{Channel, ElementError};
use narration_engine::background::{IssueKind, TrackCategory};
use narration_engine::clock::{AudioClock, ManualClock};
use narration_engine::{
    build_timing_map, current_word_index, BackgroundTrack, ChannelStatus, NarrationBuffer,
    NarrationSession, PlaybackController, PlaybackState,
};

type Player = PlaybackController<ManualClock, MemoryBackend>;
type Session = NarrationSession<ManualClock, MemoryBackend, MemoryBackend>;

const SCRIPTS: &[&str] = &[
    "Breathe in. Breathe out.",
    "Close your eyes. [pause] Notice the weight of your body. [long pause] Rest.",
    "[whispers] Let go... [pause]",
    "One",
    "   spaced    out\n\nwords   ",
    "Trailing tags. [softly] [pause]",
];

/// Player with a narration of `duration` seconds already loaded
fn loaded_player(script: &str, duration: f64) -> (Player, ManualClock, MemoryBackend) {
    let clock = ManualClock::new();
    let backend = MemoryBackend::new();
    let mut player = PlaybackController::new(clock.clone(), backend.clone());
    player.load(NarrationBuffer::silence(duration, 1_000).unwrap(), script);
    (player, clock, backend)
}

/// Session with a "Breathe in. Breathe out." narration of `duration` seconds
fn session(duration: f64) -> (Session, ManualClock, MemoryBackend) {
    let clock = ManualClock::new();
    let backend = MemoryBackend::new();
    let mut session = NarrationSession::new(clock.clone(), backend.clone(), backend.clone());
    session.load(
        NarrationBuffer::silence(duration, 1_000).unwrap(),
        "Breathe in. Breathe out.",
    );
    (session, clock, backend)
}

fn track(id: &str) -> BackgroundTrack {
    BackgroundTrack::new(id, id, format!("audio/{id}.mp3"), TrackCategory::Nature)
}

#[test]
fn test_scenario_a_breathe_in_breathe_out() {
    let map = build_timing_map("Breathe in. Breathe out.", 10.0);

    assert_eq!(map.word_count(), 4, "four words");
    assert_eq!(map.sentence_count(), 2, "two sentences");
    assert_eq!(map.segments().len(), 4);
    assert_eq!(map.segments().last().unwrap().end_time, 10.0);
    let sentences: Vec<usize> = map.segments().iter().map(|s| s.sentence_index).collect();
    assert_eq!(sentences, vec![0, 0, 1, 1]);
}

#[test]
fn test_segments_ordered_contiguous_and_end_exactly() {
    for script in SCRIPTS {
        for duration in [0.5, 7.25, 10.0, 3_600.0] {
            let map = build_timing_map(script, duration);
            let segments = map.segments();
            assert!(!segments.is_empty(), "{script:?} has segments");
            assert_eq!(segments[0].start_time, 0.0);
            for pair in segments.windows(2) {
                assert!(pair[0].start_time <= pair[0].end_time, "{script:?}: ordered");
                assert_eq!(pair[0].end_time, pair[1].start_time, "{script:?}: no gaps");
            }
            assert_eq!(
                segments.last().unwrap().end_time,
                duration,
                "{script:?} @ {duration}: last segment ends at duration"
            );
        }
    }
}

#[test]
fn test_empty_script_has_no_words() {
    for script in ["", "   ", "\n\t"] {
        let map = build_timing_map(script, 5.0);
        assert_eq!(map.word_count(), 0);
        assert!(map.words().next().is_none());
        assert_eq!(current_word_index(&map, 1.0), None);
    }
}

#[test]
fn test_word_index_monotonic() {
    for script in SCRIPTS {
        let map = build_timing_map(script, 12.0);
        let mut last = None;
        for step in 0..=1_300 {
            let index = current_word_index(&map, step as f64 * 0.01);
            assert!(index >= last, "{script:?}: index went back at {step}");
            last = index;
        }
    }
}

#[test]
fn test_timing_map_json_export() {
    let map = build_timing_map("Hello there. [pause]", 4.0);
    let json: serde_json::Value = serde_json::from_str(&map.to_json().unwrap()).unwrap();

    assert_eq!(json["wordCount"], 2);
    assert_eq!(json["totalDuration"], 4.0);
    assert_eq!(json["segments"][0]["type"], "word");
    assert_eq!(json["segments"][2]["type"], "pause");
    assert!(json["segments"][2].get("wordIndex").is_none());
}

#[test]
fn test_scenario_b_pause_and_resume() {
    let (mut player, clock, _backend) = loaded_player("Breathe in. Breathe out.", 10.0);

    player.play().unwrap();
    clock.advance(3.0);
    player.pause();
    assert_relative_eq!(player.pause_offset(), 3.0, epsilon = 1e-9);

    clock.advance(2.0);
    player.play().unwrap();
    assert_relative_eq!(player.start_clock(), clock.now(), epsilon = 1e-9);
    assert_relative_eq!(player.current_time(), 3.0, epsilon = 1e-9);

    clock.advance(1.5);
    assert_relative_eq!(player.current_time(), 4.5, epsilon = 1e-9);
}

#[test]
fn test_pause_twice_is_pause_once() {
    let (mut player, clock, backend) = loaded_player("Breathe in. Breathe out.", 10.0);
    player.play().unwrap();
    clock.advance(2.0);

    player.pause();
    let events = player.drain_events().len();
    let offset = player.pause_offset();

    clock.advance(1.0);
    player.pause();
    assert!(player.drain_events().is_empty(), "second pause emits nothing");
    assert!(events > 0);
    assert_eq!(player.pause_offset(), offset);
    assert_eq!(player.state(), PlaybackState::Paused);
    assert_eq!(backend.active_sources(), 0);
}

#[test]
fn test_seek_round_trip_from_any_state() {
    for prior in ["ready", "playing", "paused"] {
        let (mut player, clock, _backend) = loaded_player("Breathe in. Breathe out.", 10.0);
        match prior {
            "playing" => player.play().unwrap(),
            "paused" => {
                player.play().unwrap();
                clock.advance(1.0);
                player.pause();
            }
            _ => {}
        }
        for target in [0.0, 2.75, 9.999] {
            player.seek(target).unwrap();
            assert_relative_eq!(player.current_time(), target, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_scenario_c_seek_past_end_clamps() {
    let (mut player, _clock, _backend) = loaded_player("Breathe in. Breathe out.", 10.0);
    player.play().unwrap();
    assert!(player.seek(15.0).is_ok());
    assert_eq!(player.current_time(), 10.0);

    assert!(player.seek(-3.0).is_ok());
    assert_eq!(player.current_time(), 0.0);
}

#[test]
fn test_sticky_word_through_pause() {
    let (mut player, clock, _backend) = loaded_player("Inhale. [long pause] Exhale.", 6.0);
    let map = player.timing_map().unwrap();
    let pause = &map.segments()[1];
    player.play().unwrap();

    clock.set((pause.start_time + pause.end_time) / 2.0);
    player.poll();
    assert_eq!(player.current_word(), Some(0), "first word stays lit in the pause");
}

#[test]
fn test_scenario_d_one_background_at_a_time() {
    let (mut session, _clock, backend) = session(10.0);
    session.select_background(track("rain"));
    session.play().unwrap();
    assert_eq!(backend.playing_elements(Channel::Background), 1);

    session.select_background(track("waves"));
    assert_eq!(backend.playing_elements(Channel::Background), 1);
    assert_eq!(backend.live_elements(Channel::Background), 1);

    let elements = backend.elements(Channel::Background);
    assert_eq!(elements.len(), 2);
    assert!(elements[0].released, "previous track released");
    assert!(!elements[0].playing);
    assert_eq!(elements[1].url.as_deref(), Some("audio/waves.mp3"));
}

#[test]
fn test_scenario_e_autoplay_block_leaves_narration_alone() {
    let (mut session, clock, backend) = session(10.0);
    backend.reject_next_play(Channel::Background, ElementError::NotAllowed);
    session.select_background(track("rain"));

    assert!(session.play().is_ok(), "blocked background is not an error");
    assert_eq!(session.narration().state(), PlaybackState::Playing);

    let status = session.background().status().clone();
    assert!(matches!(status, ChannelStatus::Blocked(_)));
    let issue = status.issue().unwrap();
    assert_eq!(issue.kind, IssueKind::AutoplayBlocked);
    assert_eq!(issue.suggestion, "Tap to enable background audio");

    clock.advance(2.0);
    session.poll();
    assert_relative_eq!(session.narration().current_time(), 2.0, epsilon = 1e-9);
    assert_eq!(session.narration().current_word(), Some(0));
}

#[test]
fn test_background_timeout_retries_once() {
    let (mut session, clock, backend) = session(60.0);
    backend.set_load_behavior(
        "audio/rain.mp3",
        narration_engine::backend::memory::LoadBehavior::Stall,
    );
    session.select_background(track("rain"));
    session.play().unwrap();

    clock.advance(15.0);
    session.poll();
    clock.advance(15.0);
    session.poll();
    clock.advance(15.0);
    session.poll();

    let elements = backend.elements(Channel::Background);
    assert_eq!(elements.len(), 2, "exactly one fallback attempt");
    assert!(elements[0].cross_origin);
    assert!(!elements[1].cross_origin);
    assert_eq!(backend.live_elements(Channel::Background), 0);
}
