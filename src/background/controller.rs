//! Background and preview channel controller

use std::collections::VecDeque;

use log::{debug, warn};

use super::status::{AudioIssue, BackgroundEvent, ChannelStatus, IssueKind};
use super::track::BackgroundTrack;
use crate::backend::{Channel, ElementError, ElementFactory, MediaElement, Readiness};
use crate::clock::AudioClock;
use crate::config::{BackgroundConfig, EngineConfig};

struct ActiveElement<E> {
    element: E,
    track: BackgroundTrack,
    load_started: f64,
    playing_since: Option<f64>,
    attempt: u8,
}

struct Slot<E> {
    active: Option<ActiveElement<E>>,
    status: ChannelStatus,
}

impl<E> Default for Slot<E> {
    fn default() -> Self {
        Slot {
            active: None,
            status: ChannelStatus::Idle,
        }
    }
}

enum PollAction {
    Nothing,
    StartedPlaying,
    Failed(ElementError),
    TimedOut,
    Finished,
    ClearIssue,
}

/// Owns the background loop and the preview player.
///
/// The two channels are separate failure domains and neither touches the
/// narration clock. No method returns an error: failures are reported as a
/// [`ChannelStatus`] carrying an [`AudioIssue`].
pub struct BackgroundMusicController<C: AudioClock, F: ElementFactory> {
    clock: C,
    factory: F,
    config: BackgroundConfig,
    volume: f32,
    background: Slot<F::Element>,
    preview: Slot<F::Element>,
    events: VecDeque<BackgroundEvent>,
}

impl<C: AudioClock, F: ElementFactory> BackgroundMusicController<C, F> {
    /// Create a controller with the default configuration
    pub fn new(clock: C, factory: F) -> Self {
        Self::with_config(clock, factory, &EngineConfig::default())
    }

    /// Create a controller using the background settings of `config`
    pub fn with_config(clock: C, factory: F, config: &EngineConfig) -> Self {
        BackgroundMusicController {
            clock,
            factory,
            config: config.background,
            volume: sanitize_volume(config.background.volume).unwrap_or(0.0),
            background: Slot::default(),
            preview: Slot::default(),
            events: VecDeque::new(),
        }
    }

    /// Start `track` as the background loop, replacing any current one.
    ///
    /// The "none" track is ignored. The preview channel is left alone.
    pub fn start(&mut self, track: &BackgroundTrack) -> ChannelStatus {
        if track.is_none() {
            return self.background.status.clone();
        }
        self.release_element(Channel::Background);
        self.launch(Channel::Background, track.clone(), self.config.cross_origin, 0);
        self.background.status.clone()
    }

    /// Stop and release the background element. Idempotent.
    pub fn stop(&mut self) {
        self.release_element(Channel::Background);
        self.set_status(Channel::Background, ChannelStatus::Idle);
    }

    /// Pause the background without releasing it
    pub fn pause(&mut self) {
        if !matches!(
            self.background.status,
            ChannelStatus::Playing | ChannelStatus::Loading
        ) {
            return;
        }
        if let Some(active) = self.background.active.as_mut() {
            active.element.pause();
            active.playing_since = None;
            self.set_status(Channel::Background, ChannelStatus::Paused);
        }
    }

    /// Resume a paused or blocked background.
    ///
    /// Returns the resulting status; Idle when there is nothing to resume.
    pub fn resume(&mut self) -> ChannelStatus {
        if matches!(
            self.background.status,
            ChannelStatus::Paused | ChannelStatus::Blocked(_)
        ) {
            self.request_play(Channel::Background);
        }
        self.background.status.clone()
    }

    /// Retry channels that were refused for lack of a user gesture.
    pub fn resume_after_gesture(&mut self) {
        for channel in [Channel::Background, Channel::Preview] {
            if matches!(self.slot(channel).status, ChannelStatus::Blocked(_)) {
                debug!("{channel:?}: retrying after user gesture");
                self.request_play(channel);
            }
        }
    }

    /// Set the volume of both channels. NaN is ignored.
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        let Some(volume) = sanitize_volume(volume) else {
            return self.volume;
        };
        self.volume = volume;
        for slot in [&mut self.background, &mut self.preview] {
            if let Some(active) = slot.active.as_mut() {
                active.element.set_volume(volume);
            }
        }
        volume
    }

    /// Audition `track` on the preview channel, replacing any previous preview.
    ///
    /// Previews never loop and stop on their own after the preview limit.
    pub fn preview(&mut self, track: &BackgroundTrack) -> ChannelStatus {
        self.stop_preview();
        if track.is_none() {
            return self.preview.status.clone();
        }
        self.launch(Channel::Preview, track.clone(), self.config.cross_origin, 0);
        self.preview.status.clone()
    }

    /// Stop and release the preview element. Idempotent.
    pub fn stop_preview(&mut self) {
        self.release_element(Channel::Preview);
        self.set_status(Channel::Preview, ChannelStatus::Idle);
    }

    /// Promote the previewed track to the background loop, ending the preview.
    pub fn commit_preview(&mut self) -> ChannelStatus {
        let Some(track) = self.preview_track().cloned() else {
            return self.background.status.clone();
        };
        self.stop_preview();
        self.start(&track)
    }

    /// Drive loading, timeouts, preview limits and message expiry.
    pub fn poll(&mut self) {
        let now = self.clock.now();
        for channel in [Channel::Background, Channel::Preview] {
            let action = self.inspect(channel, now);
            self.apply(channel, action, now);
        }
    }

    /// Background channel status
    pub fn status(&self) -> &ChannelStatus {
        &self.background.status
    }

    /// Preview channel status
    pub fn preview_status(&self) -> &ChannelStatus {
        &self.preview.status
    }

    /// Track held by the background element
    pub fn current_track(&self) -> Option<&BackgroundTrack> {
        self.background.active.as_ref().map(|a| &a.track)
    }

    /// Track held by the preview element
    pub fn preview_track(&self) -> Option<&BackgroundTrack> {
        self.preview.active.as_ref().map(|a| &a.track)
    }

    /// Current volume
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Take all events emitted since the last call
    pub fn drain_events(&mut self) -> Vec<BackgroundEvent> {
        self.events.drain(..).collect()
    }

    fn launch(&mut self, channel: Channel, track: BackgroundTrack, cross_origin: bool, attempt: u8) {
        let Some(url) = track.url.clone().filter(|u| !u.trim().is_empty()) else {
            self.set_status(channel, ChannelStatus::Idle);
            return;
        };

        let now = self.clock.now();
        let mut element = self.factory.create_element(channel);
        element.set_looping(channel == Channel::Background && track.looping);
        element.set_volume(self.volume);
        if let Err(err) = element.load(&url, cross_origin) {
            self.fail(channel, &track.id, &err, now);
            return;
        }

        debug!(
            "{channel:?}: loading '{}' from {url} (attempt {attempt}, cross-origin {cross_origin})",
            track.id
        );
        self.slot_mut(channel).active = Some(ActiveElement {
            element,
            track,
            load_started: now,
            playing_since: None,
            attempt,
        });
        self.request_play(channel);
    }

    fn request_play(&mut self, channel: Channel) {
        let now = self.clock.now();
        let ttl = self.config.status_ttl_secs;
        let Some(active) = self.slot_mut(channel).active.as_mut() else {
            return;
        };

        match active.element.play() {
            Ok(()) => match active.element.readiness() {
                Readiness::Ready => {
                    active.playing_since = Some(now);
                    self.set_status(channel, ChannelStatus::Playing);
                }
                Readiness::Failed(err) => {
                    let track_id = active.track.id.clone();
                    self.fail(channel, &track_id, &err, now);
                }
                _ => {
                    active.load_started = now;
                    self.set_status(channel, ChannelStatus::Loading);
                }
            },
            Err(ElementError::NotAllowed) => {
                active.element.pause();
                warn!("{channel:?}: playback of '{}' needs a user gesture", active.track.id);
                let issue = AudioIssue::from_element_error(&ElementError::NotAllowed, now, ttl);
                self.set_status(channel, ChannelStatus::Blocked(issue));
            }
            Err(err) => {
                let track_id = active.track.id.clone();
                self.fail(channel, &track_id, &err, now);
            }
        }
    }

    fn inspect(&self, channel: Channel, now: f64) -> PollAction {
        let slot = self.slot(channel);
        let Some(active) = slot.active.as_ref() else {
            return match &slot.status {
                ChannelStatus::Failed(issue) if issue.is_expired(now) => PollAction::ClearIssue,
                _ => PollAction::Nothing,
            };
        };

        match (&slot.status, active.element.readiness()) {
            (ChannelStatus::Loading | ChannelStatus::Playing, Readiness::Failed(err)) => {
                PollAction::Failed(err)
            }
            (ChannelStatus::Loading, Readiness::Ready) => PollAction::StartedPlaying,
            (ChannelStatus::Loading, _)
                if now - active.load_started >= self.config.load_timeout_secs =>
            {
                PollAction::TimedOut
            }
            (ChannelStatus::Playing, Readiness::Ended) => PollAction::Finished,
            (ChannelStatus::Playing, _)
                if channel == Channel::Preview
                    && active
                        .playing_since
                        .map_or(false, |t| now - t >= self.config.preview_limit_secs) =>
            {
                PollAction::Finished
            }
            _ => PollAction::Nothing,
        }
    }

    fn apply(&mut self, channel: Channel, action: PollAction, now: f64) {
        match action {
            PollAction::Nothing => {}
            PollAction::StartedPlaying => {
                if let Some(active) = self.slot_mut(channel).active.as_mut() {
                    active.playing_since = Some(now);
                }
                self.set_status(channel, ChannelStatus::Playing);
            }
            PollAction::Failed(err) => {
                let track_id = self
                    .slot(channel)
                    .active
                    .as_ref()
                    .map(|a| a.track.id.clone())
                    .unwrap_or_default();
                self.fail(channel, &track_id, &err, now);
            }
            PollAction::TimedOut => self.time_out(channel, now),
            PollAction::Finished => match channel {
                Channel::Preview => self.stop_preview(),
                Channel::Background => self.stop(),
            },
            PollAction::ClearIssue => self.set_status(channel, ChannelStatus::Idle),
        }
    }

    /// First timeout retries once without cross-origin attributes; the
    /// second is final.
    fn time_out(&mut self, channel: Channel, now: f64) {
        let Some(active) = self.slot_mut(channel).active.take() else {
            return;
        };
        let (track, attempt) = (active.track.clone(), active.attempt);
        dispose(active);

        warn!("{channel:?}: '{}' did not load in time (attempt {attempt})", track.id);
        let issue = AudioIssue::new(IssueKind::Timeout, None, now, self.config.status_ttl_secs);
        self.set_status(channel, ChannelStatus::Failed(issue));

        if attempt == 0 {
            self.events.push_back(BackgroundEvent::Retrying {
                channel,
                track_id: track.id.clone(),
            });
            self.launch(channel, track, false, attempt + 1);
        }
    }

    fn fail(&mut self, channel: Channel, track_id: &str, error: &ElementError, now: f64) {
        warn!("{channel:?}: '{track_id}' failed: {error}");
        self.release_element(channel);
        let issue = AudioIssue::from_element_error(error, now, self.config.status_ttl_secs);
        self.set_status(channel, ChannelStatus::Failed(issue));
    }

    fn release_element(&mut self, channel: Channel) {
        if let Some(active) = self.slot_mut(channel).active.take() {
            debug!("{channel:?}: releasing '{}'", active.track.id);
            dispose(active);
        }
    }

    fn set_status(&mut self, channel: Channel, status: ChannelStatus) {
        let slot = self.slot_mut(channel);
        if slot.status == status {
            return;
        }
        slot.status = status.clone();
        self.events
            .push_back(BackgroundEvent::StatusChanged { channel, status });
    }

    fn slot(&self, channel: Channel) -> &Slot<F::Element> {
        match channel {
            Channel::Background => &self.background,
            Channel::Preview => &self.preview,
        }
    }

    fn slot_mut(&mut self, channel: Channel) -> &mut Slot<F::Element> {
        match channel {
            Channel::Background => &mut self.background,
            Channel::Preview => &mut self.preview,
        }
    }
}

fn dispose<E: MediaElement>(mut active: ActiveElement<E>) {
    active.element.pause();
    active.element.rewind();
}

fn sanitize_volume(volume: f32) -> Option<f32> {
    if volume.is_nan() {
        None
    } else {
        Some(volume.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{LoadBehavior, MemoryBackend};
    use crate::background::TrackCategory;
    use crate::clock::ManualClock;

    type Controller = BackgroundMusicController<ManualClock, MemoryBackend>;

    fn setup() -> (Controller, ManualClock, MemoryBackend) {
        let clock = ManualClock::new();
        let backend = MemoryBackend::new();
        let controller = BackgroundMusicController::new(clock.clone(), backend.clone());
        (controller, clock, backend)
    }

    fn rain() -> BackgroundTrack {
        BackgroundTrack::new("rain", "Soft Rain", "audio/rain.mp3", TrackCategory::Nature)
    }

    fn waves() -> BackgroundTrack {
        BackgroundTrack::new("waves", "Waves", "audio/waves.mp3", TrackCategory::Nature)
    }

    #[test]
    fn test_start_plays_looping_at_volume() {
        let (mut bg, _clock, backend) = setup();
        assert_eq!(bg.start(&rain()), ChannelStatus::Playing);

        let elements = backend.elements(Channel::Background);
        assert_eq!(elements.len(), 1);
        assert!(elements[0].looping);
        assert!(elements[0].cross_origin);
        assert_eq!(elements[0].volume, crate::config::DEFAULT_BACKGROUND_VOLUME);
        assert_eq!(bg.current_track().map(|t| t.id.as_str()), Some("rain"));
    }

    #[test]
    fn test_start_replaces_previous_element() {
        let (mut bg, _clock, backend) = setup();
        bg.start(&rain());
        bg.start(&waves());

        assert_eq!(backend.live_elements(Channel::Background), 1);
        assert_eq!(backend.playing_elements(Channel::Background), 1);
        let first = &backend.elements(Channel::Background)[0];
        assert!(first.released);
        assert_eq!(first.rewinds, 1);
    }

    #[test]
    fn test_start_with_none_track_is_no_op() {
        let (mut bg, _clock, backend) = setup();
        bg.start(&rain());
        bg.drain_events();

        assert_eq!(bg.start(&BackgroundTrack::none()), ChannelStatus::Playing);
        assert_eq!(backend.playing_elements(Channel::Background), 1);
        assert_eq!(backend.elements(Channel::Background).len(), 1);
        assert_eq!(bg.current_track().map(|t| t.id.as_str()), Some("rain"));
        assert!(bg.drain_events().is_empty());
    }

    #[test]
    fn test_stop_releases_background() {
        let (mut bg, _clock, backend) = setup();
        bg.start(&rain());
        bg.stop();
        assert_eq!(bg.status(), &ChannelStatus::Idle);
        assert_eq!(backend.live_elements(Channel::Background), 0);
        assert!(bg.current_track().is_none());
    }

    #[test]
    fn test_preview_survives_background_start() {
        let (mut bg, _clock, backend) = setup();
        bg.preview(&waves());
        assert_eq!(bg.start(&rain()), ChannelStatus::Playing);

        assert_eq!(bg.preview_status(), &ChannelStatus::Playing);
        assert_eq!(bg.preview_track().map(|t| t.id.as_str()), Some("waves"));
        assert_eq!(backend.live_elements(Channel::Preview), 1);
        assert_eq!(backend.playing_elements(Channel::Background), 1);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut bg, _clock, _backend) = setup();
        bg.start(&rain());
        bg.drain_events();
        bg.stop();
        bg.stop();
        let events = bg.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(bg.status(), &ChannelStatus::Idle);
    }

    #[test]
    fn test_autoplay_block_keeps_element_for_gesture() {
        let (mut bg, _clock, backend) = setup();
        backend.reject_next_play(Channel::Background, ElementError::NotAllowed);

        let status = bg.start(&rain());
        let issue = status.issue().unwrap();
        assert!(matches!(status, ChannelStatus::Blocked(_)));
        assert_eq!(issue.kind, IssueKind::AutoplayBlocked);
        assert_eq!(issue.suggestion, "Tap to enable background audio");
        assert_eq!(backend.live_elements(Channel::Background), 1);
        assert_eq!(backend.playing_elements(Channel::Background), 0);

        bg.resume_after_gesture();
        assert_eq!(bg.status(), &ChannelStatus::Playing);
        assert_eq!(backend.playing_elements(Channel::Background), 1);
    }

    #[test]
    fn test_rejected_play_releases_element() {
        let (mut bg, _clock, backend) = setup();
        backend.reject_next_play(
            Channel::Background,
            ElementError::Unsupported("audio/x-foo".into()),
        );
        let status = bg.start(&rain());
        assert_eq!(status.issue().map(|i| i.kind), Some(IssueKind::Unsupported));
        assert_eq!(backend.live_elements(Channel::Background), 0);
    }

    #[test]
    fn test_loading_then_ready() {
        let (mut bg, _clock, backend) = setup();
        backend.set_load_behavior("audio/rain.mp3", LoadBehavior::StallWithCrossOrigin);
        assert_eq!(bg.start(&rain()), ChannelStatus::Loading);
        bg.poll();
        assert_eq!(bg.status(), &ChannelStatus::Loading);

        backend.set_load_behavior("audio/rain.mp3", LoadBehavior::Ready);
        bg.poll();
        assert_eq!(bg.status(), &ChannelStatus::Playing);
    }

    #[test]
    fn test_timeout_retries_once_without_cross_origin() {
        let (mut bg, clock, backend) = setup();
        backend.set_load_behavior("audio/rain.mp3", LoadBehavior::StallWithCrossOrigin);
        bg.start(&rain());

        clock.advance(crate::config::DEFAULT_LOAD_TIMEOUT_SECS);
        bg.poll();

        let events = bg.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            BackgroundEvent::StatusChanged { status: ChannelStatus::Failed(issue), .. }
                if issue.kind == IssueKind::Timeout
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, BackgroundEvent::Retrying { track_id, .. } if track_id == "rain")));

        let elements = backend.elements(Channel::Background);
        assert_eq!(elements.len(), 2);
        assert!(elements[0].released);
        assert!(!elements[1].cross_origin);
        assert_eq!(bg.status(), &ChannelStatus::Playing);
    }

    #[test]
    fn test_second_timeout_is_final() {
        let (mut bg, clock, backend) = setup();
        backend.set_load_behavior("audio/rain.mp3", LoadBehavior::Stall);
        bg.start(&rain());

        clock.advance(15.0);
        bg.poll();
        assert_eq!(bg.status(), &ChannelStatus::Loading);

        clock.advance(15.0);
        bg.poll();
        assert_eq!(bg.status().issue().map(|i| i.kind), Some(IssueKind::Timeout));
        assert_eq!(backend.elements(Channel::Background).len(), 2);
        assert_eq!(backend.live_elements(Channel::Background), 0);

        clock.advance(60.0);
        bg.poll();
        assert_eq!(backend.elements(Channel::Background).len(), 2);
    }

    #[test]
    fn test_failed_status_expires() {
        let (mut bg, clock, backend) = setup();
        backend.set_load_behavior(
            "audio/rain.mp3",
            LoadBehavior::Fail(ElementError::Network("HTTP 404".into())),
        );
        let status = bg.start(&rain());
        assert_eq!(status.issue().map(|i| i.kind), Some(IssueKind::Network));

        clock.advance(4.0);
        bg.poll();
        assert!(bg.status().issue().is_some());

        clock.advance(1.0);
        bg.poll();
        assert_eq!(bg.status(), &ChannelStatus::Idle);
    }

    #[test]
    fn test_pause_and_resume() {
        let (mut bg, _clock, backend) = setup();
        bg.start(&rain());
        bg.pause();
        assert_eq!(bg.status(), &ChannelStatus::Paused);
        assert_eq!(backend.playing_elements(Channel::Background), 0);
        assert_eq!(backend.live_elements(Channel::Background), 1);

        assert_eq!(bg.resume(), ChannelStatus::Playing);
        assert_eq!(backend.elements(Channel::Background).len(), 1);
    }

    #[test]
    fn test_resume_without_element_is_idle() {
        let (mut bg, _clock, _backend) = setup();
        assert_eq!(bg.resume(), ChannelStatus::Idle);
    }

    #[test]
    fn test_volume_clamped_and_live() {
        let (mut bg, _clock, backend) = setup();
        bg.start(&rain());
        bg.preview(&waves());

        assert_eq!(bg.set_volume(1.7), 1.0);
        assert_eq!(bg.set_volume(f32::NAN), 1.0);
        assert_eq!(bg.set_volume(0.5), 0.5);
        assert_eq!(backend.elements(Channel::Background)[0].volume, 0.5);
        assert_eq!(backend.elements(Channel::Preview)[0].volume, 0.5);
        assert_eq!(bg.set_volume(-1.0), 0.0);
    }

    #[test]
    fn test_preview_does_not_loop_and_leaves_background() {
        let (mut bg, _clock, backend) = setup();
        bg.start(&rain());
        assert_eq!(bg.preview(&waves()), ChannelStatus::Playing);
        assert!(!backend.elements(Channel::Preview)[0].looping);
        assert_eq!(backend.playing_elements(Channel::Background), 1);

        bg.preview(&rain());
        assert_eq!(backend.live_elements(Channel::Preview), 1);
        assert_eq!(bg.preview_track().map(|t| t.id.as_str()), Some("rain"));
    }

    #[test]
    fn test_preview_stops_at_end_and_limit() {
        let (mut bg, clock, backend) = setup();
        bg.preview(&waves());
        backend.finish_element(Channel::Preview);
        bg.poll();
        assert_eq!(bg.preview_status(), &ChannelStatus::Idle);
        assert_eq!(backend.live_elements(Channel::Preview), 0);

        bg.preview(&waves());
        clock.advance(crate::config::DEFAULT_PREVIEW_LIMIT_SECS);
        bg.poll();
        assert_eq!(bg.preview_status(), &ChannelStatus::Idle);
    }

    #[test]
    fn test_channels_fail_independently() {
        let (mut bg, _clock, backend) = setup();
        bg.start(&rain());
        backend.reject_next_play(Channel::Preview, ElementError::Decode("truncated".into()));
        let status = bg.preview(&waves());
        assert_eq!(status.issue().map(|i| i.kind), Some(IssueKind::Decode));
        assert_eq!(bg.status(), &ChannelStatus::Playing);
    }

    #[test]
    fn test_commit_preview() {
        let (mut bg, _clock, backend) = setup();
        bg.start(&rain());
        bg.preview(&waves());
        assert_eq!(bg.commit_preview(), ChannelStatus::Playing);

        assert_eq!(bg.current_track().map(|t| t.id.as_str()), Some("waves"));
        assert_eq!(bg.preview_status(), &ChannelStatus::Idle);
        assert_eq!(backend.live_elements(Channel::Preview), 0);
        assert_eq!(backend.live_elements(Channel::Background), 1);
        assert!(backend.elements(Channel::Background)[1].looping);
    }
}
