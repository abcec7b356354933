//! Narration session
//!
//! Top-level command surface pairing one [`PlaybackController`] with one
//! [`BackgroundMusicController`]. Narration commands return their result to
//! the caller; background outcomes are only reported as events and never turn
//! a narration success into a failure.

use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::backend::{ElementFactory, SourceFactory};
use crate::background::{
    BackgroundEvent, BackgroundMusicController, BackgroundTrack, ChannelStatus, TrackPreferences,
};
use crate::buffer::NarrationBuffer;
use crate::clock::AudioClock;
use crate::config::EngineConfig;
use crate::playback::{PlaybackController, PlaybackEvent, PlaybackState};
use crate::timing::TimingMap;
use crate::Result;

/// Event from either half of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "channel", content = "event")]
pub enum SessionEvent {
    /// Narration transport event
    Narration(PlaybackEvent),
    /// Background or preview channel event
    Background(BackgroundEvent),
}

/// Narration plus background music, driven together
pub struct NarrationSession<C, S, E>
where
    C: AudioClock + Clone,
    S: SourceFactory,
    E: ElementFactory,
{
    narration: PlaybackController<C, S>,
    background: BackgroundMusicController<C, E>,
    selected: BackgroundTrack,
}

impl<C, S, E> NarrationSession<C, S, E>
where
    C: AudioClock + Clone,
    S: SourceFactory,
    E: ElementFactory,
{
    /// Create a session with the default configuration
    pub fn new(clock: C, sources: S, elements: E) -> Self {
        Self::with_config(clock, sources, elements, &EngineConfig::default())
    }

    /// Create a session; both controllers share `clock`.
    pub fn with_config(clock: C, sources: S, elements: E, config: &EngineConfig) -> Self {
        NarrationSession {
            narration: PlaybackController::with_config(clock.clone(), sources, config),
            background: BackgroundMusicController::with_config(clock, elements, config),
            selected: BackgroundTrack::none(),
        }
    }

    /// Load a narration and build its timing map.
    pub fn load(&mut self, buffer: NarrationBuffer, script: &str) -> Arc<TimingMap> {
        self.narration.load(buffer, script)
    }

    /// Start the narration, then bring up the selected background.
    pub fn play(&mut self) -> Result<()> {
        self.narration.play()?;
        let status = self.background.status().clone();
        match status {
            ChannelStatus::Paused | ChannelStatus::Blocked(_) => {
                self.background.resume();
            }
            ChannelStatus::Idle | ChannelStatus::Failed(_) if !self.selected.is_none() => {
                let track = self.selected.clone();
                self.background.start(&track);
            }
            _ => {}
        }
        Ok(())
    }

    /// Pause narration and background together
    pub fn pause(&mut self) {
        self.narration.pause();
        self.background.pause();
    }

    /// Seek the narration; background audio is unaffected.
    pub fn seek(&mut self, target: f64) -> Result<()> {
        self.narration.seek(target)
    }

    /// Seek the narration to the start of a word
    pub fn seek_to_word(&mut self, word_index: usize) -> Result<()> {
        self.narration.seek_to_word(word_index)
    }

    /// Stop and release everything. Idempotent.
    pub fn stop(&mut self) {
        self.narration.stop();
        self.background.stop_preview();
        self.background.stop();
    }

    /// Choose the background track.
    ///
    /// Takes effect immediately while narrating; otherwise on the next `play`.
    pub fn select_background(&mut self, track: BackgroundTrack) {
        debug!("background selection: '{}'", track.id);
        self.selected = track;
        if self.selected.is_none() {
            self.background.stop();
        } else if self.narration.state() == PlaybackState::Playing {
            let track = self.selected.clone();
            self.background.start(&track);
        } else {
            self.background.stop();
        }
    }

    /// Audition a track without changing the selection
    pub fn preview(&mut self, track: &BackgroundTrack) {
        self.background.preview(track);
    }

    /// Stop the audition
    pub fn stop_preview(&mut self) {
        self.background.stop_preview();
    }

    /// Select the auditioned track; starts it if narrating.
    pub fn commit_preview(&mut self) {
        let Some(track) = self.background.preview_track().cloned() else {
            return;
        };
        if self.narration.state() == PlaybackState::Playing {
            self.selected = track;
            self.background.commit_preview();
        } else {
            self.background.stop_preview();
            self.select_background(track);
        }
    }

    /// Set the background volume; returns the applied value.
    pub fn set_background_volume(&mut self, volume: f32) -> f32 {
        self.background.set_volume(volume)
    }

    /// Snapshot of the selection for persistence
    pub fn preferences(&self) -> TrackPreferences {
        TrackPreferences {
            selected: self.selected.clone(),
            volume: self.background.volume(),
        }
    }

    /// Restore a persisted selection
    pub fn apply_preferences(&mut self, prefs: &TrackPreferences) {
        self.set_background_volume(prefs.volume);
        self.select_background(prefs.selected.clone());
    }

    /// Drive both controllers. Returns whether a narration tick ran.
    ///
    /// The background stops when the narration reaches its end.
    pub fn poll(&mut self) -> bool {
        let was_playing = self.narration.state() == PlaybackState::Playing;
        let ticked = self.narration.poll();
        if was_playing && self.narration.state() == PlaybackState::Idle {
            self.background.stop();
        }
        self.background.poll();
        ticked
    }

    /// Take all events emitted since the last call, narration first
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut events: Vec<SessionEvent> = self
            .narration
            .drain_events()
            .into_iter()
            .map(SessionEvent::Narration)
            .collect();
        events.extend(
            self.background
                .drain_events()
                .into_iter()
                .map(SessionEvent::Background),
        );
        events
    }

    /// Selected background track
    pub fn selected_background(&self) -> &BackgroundTrack {
        &self.selected
    }

    /// Narration controller
    pub fn narration(&self) -> &PlaybackController<C, S> {
        &self.narration
    }

    /// Background controller
    pub fn background(&self) -> &BackgroundMusicController<C, E> {
        &self.background
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::backend::{Channel, ElementError};
    use crate::background::TrackCategory;
    use crate::clock::ManualClock;

    type Session = NarrationSession<ManualClock, MemoryBackend, MemoryBackend>;

    fn setup() -> (Session, ManualClock, MemoryBackend) {
        let clock = ManualClock::new();
        let backend = MemoryBackend::new();
        let mut session = NarrationSession::new(clock.clone(), backend.clone(), backend.clone());
        session.load(NarrationBuffer::silence(4.0, 100).unwrap(), "One two. Three four.");
        (session, clock, backend)
    }

    fn rain() -> BackgroundTrack {
        BackgroundTrack::new("rain", "Soft Rain", "audio/rain.mp3", TrackCategory::Nature)
    }

    #[test]
    fn test_play_starts_selected_background() {
        let (mut session, _clock, backend) = setup();
        session.select_background(rain());
        assert_eq!(backend.live_elements(Channel::Background), 0);

        session.play().unwrap();
        assert_eq!(backend.playing_elements(Channel::Background), 1);
        assert_eq!(session.background().status(), &ChannelStatus::Playing);
    }

    #[test]
    fn test_pause_and_resume_both() {
        let (mut session, _clock, backend) = setup();
        session.select_background(rain());
        session.play().unwrap();

        session.pause();
        assert_eq!(session.narration().state(), PlaybackState::Paused);
        assert_eq!(backend.playing_elements(Channel::Background), 0);
        assert_eq!(backend.live_elements(Channel::Background), 1);

        session.play().unwrap();
        assert_eq!(backend.playing_elements(Channel::Background), 1);
        assert_eq!(backend.elements(Channel::Background).len(), 1);
    }

    #[test]
    fn test_background_failure_does_not_fail_play() {
        let (mut session, _clock, backend) = setup();
        backend.reject_next_play(Channel::Background, ElementError::Network("offline".into()));
        session.select_background(rain());

        assert!(session.play().is_ok());
        assert_eq!(session.narration().state(), PlaybackState::Playing);
        let events = session.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::Background(BackgroundEvent::StatusChanged {
                status: ChannelStatus::Failed(_),
                ..
            })
        )));
    }

    #[test]
    fn test_seek_leaves_background_alone() {
        let (mut session, _clock, backend) = setup();
        session.select_background(rain());
        session.play().unwrap();
        session.seek(2.5).unwrap();
        assert_eq!(backend.elements(Channel::Background).len(), 1);
        assert_eq!(backend.playing_elements(Channel::Background), 1);
    }

    #[test]
    fn test_natural_end_stops_background() {
        let (mut session, clock, backend) = setup();
        session.select_background(rain());
        session.play().unwrap();

        clock.advance(5.0);
        session.poll();
        assert_eq!(session.narration().state(), PlaybackState::Idle);
        assert_eq!(backend.live_elements(Channel::Background), 0);
    }

    #[test]
    fn test_stop_releases_everything() {
        let (mut session, _clock, backend) = setup();
        session.select_background(rain());
        session.play().unwrap();
        session.preview(&rain());

        session.stop();
        session.stop();
        assert_eq!(backend.active_sources(), 0);
        assert_eq!(backend.live_elements(Channel::Background), 0);
        assert_eq!(backend.live_elements(Channel::Preview), 0);
    }

    #[test]
    fn test_selecting_none_stops_background() {
        let (mut session, _clock, backend) = setup();
        session.select_background(rain());
        session.play().unwrap();

        session.select_background(BackgroundTrack::none());
        assert_eq!(session.background().status(), &ChannelStatus::Idle);
        assert_eq!(backend.live_elements(Channel::Background), 0);
        assert_eq!(session.narration().state(), PlaybackState::Playing);
    }

    #[test]
    fn test_play_keeps_running_preview() {
        let (mut session, _clock, backend) = setup();
        let waves = BackgroundTrack::new("waves", "Waves", "audio/waves.mp3", TrackCategory::Nature);
        session.select_background(rain());
        session.preview(&waves);

        session.play().unwrap();
        assert_eq!(backend.playing_elements(Channel::Background), 1);
        assert_eq!(backend.playing_elements(Channel::Preview), 1);
        assert_eq!(session.background().preview_status(), &ChannelStatus::Playing);
    }

    #[test]
    fn test_commit_preview_while_playing_replaces_background() {
        let (mut session, _clock, backend) = setup();
        let waves = BackgroundTrack::new("waves", "Waves", "audio/waves.mp3", TrackCategory::Nature);
        session.select_background(rain());
        session.play().unwrap();
        session.preview(&waves);

        session.commit_preview();
        assert_eq!(session.selected_background().id, "waves");
        assert_eq!(backend.live_elements(Channel::Preview), 0);
        assert_eq!(backend.live_elements(Channel::Background), 1);
        assert_eq!(
            session.background().current_track().map(|t| t.id.as_str()),
            Some("waves")
        );
    }

    #[test]
    fn test_commit_preview_while_paused_only_selects() {
        let (mut session, _clock, backend) = setup();
        session.preview(&rain());
        session.commit_preview();

        assert_eq!(session.selected_background().id, "rain");
        assert_eq!(backend.live_elements(Channel::Preview), 0);
        assert_eq!(backend.live_elements(Channel::Background), 0);
    }

    #[test]
    fn test_preferences() {
        let (mut session, _clock, _backend) = setup();
        session.apply_preferences(&TrackPreferences {
            selected: rain(),
            volume: 0.8,
        });
        let prefs = session.preferences();
        assert_eq!(prefs.selected.id, "rain");
        assert_eq!(prefs.volume, 0.8);
    }
}
