//! Narration transport controller

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, warn};

use super::{PlaybackEvent, PlaybackState, TickHandle, TickScheduler};
use crate::backend::{PlayableSource, SourceFactory};
use crate::buffer::NarrationBuffer;
use crate::clock::AudioClock;
use crate::config::EngineConfig;
use crate::sync::{current_word_index, WordSyncTracker};
use crate::timing::{TimingMap, TimingMapBuilder};
use crate::{NarrationError, Result};

struct LoadedNarration {
    buffer: NarrationBuffer,
    map: Arc<TimingMap>,
    duration: f64,
}

/// Sole authority over narration position
///
/// All transitions take `&mut self` and complete synchronously. Every
/// transition that interrupts playback cancels the pending tick before it
/// touches the offset, so a stale tick never mixes two runs.
pub struct PlaybackController<C: AudioClock, F: SourceFactory> {
    clock: C,
    factory: F,
    builder: TimingMapBuilder,
    tick_interval: f64,
    state: PlaybackState,
    narration: Option<LoadedNarration>,
    source: Option<F::Source>,
    pause_offset: f64,
    start_clock: f64,
    scheduler: TickScheduler,
    tracker: WordSyncTracker,
    events: VecDeque<PlaybackEvent>,
}

impl<C: AudioClock, F: SourceFactory> PlaybackController<C, F> {
    /// Create a controller with the default configuration
    pub fn new(clock: C, factory: F) -> Self {
        Self::with_config(clock, factory, &EngineConfig::default())
    }

    /// Create a controller using the timing and transport settings of `config`
    pub fn with_config(clock: C, factory: F, config: &EngineConfig) -> Self {
        PlaybackController {
            clock,
            factory,
            builder: TimingMapBuilder::with_weights(config.timing),
            tick_interval: config.playback.tick_interval_secs,
            state: PlaybackState::Idle,
            narration: None,
            source: None,
            pause_offset: 0.0,
            start_clock: 0.0,
            scheduler: TickScheduler::new(),
            tracker: WordSyncTracker::new(),
            events: VecDeque::new(),
        }
    }

    /// Load a narration, building its timing map from `script`.
    ///
    /// Any current narration is stopped and discarded first.
    pub fn load(&mut self, buffer: NarrationBuffer, script: &str) -> Arc<TimingMap> {
        let map = self.builder.build(script, buffer.duration());
        self.load_map(buffer, map)
    }

    /// Load a narration with a prebuilt timing map.
    pub fn load_map(&mut self, buffer: NarrationBuffer, map: TimingMap) -> Arc<TimingMap> {
        self.stop();

        let map = Arc::new(map);
        debug!(
            "narration loaded: {:.2}s, {} words, {} sentences",
            buffer.duration(),
            map.word_count(),
            map.sentence_count()
        );
        self.narration = Some(LoadedNarration {
            duration: buffer.duration(),
            buffer,
            map: Arc::clone(&map),
        });
        self.pause_offset = 0.0;
        self.set_state(PlaybackState::Ready);
        map
    }

    /// Start or resume playback at the current offset.
    ///
    /// An offset at the end ends on the first tick. No-op while playing.
    /// Fails without side effects when nothing is loaded or the backend
    /// refuses to start a source.
    pub fn play(&mut self) -> Result<()> {
        match (self.state, self.narration.is_some()) {
            (PlaybackState::Playing, _) => return Ok(()),
            (PlaybackState::Ready | PlaybackState::Paused, true) => {}
            (state, _) => {
                return Err(NarrationError::InvalidState {
                    operation: "play",
                    state,
                })
            }
        }

        self.start_source(self.pause_offset)?;
        self.set_state(PlaybackState::Playing);
        self.schedule_tick();
        Ok(())
    }

    /// Pause, keeping the position. No-op unless playing.
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.scheduler.cancel();
        self.pause_offset = self.current_time();
        self.stop_source();
        self.set_state(PlaybackState::Paused);
    }

    /// Move to `target` seconds, clamped to the narration.
    ///
    /// Playback continues from the new offset if it was playing; otherwise
    /// the controller is left paused there.
    pub fn seek(&mut self, target: f64) -> Result<()> {
        if !target.is_finite() {
            return Err(NarrationError::InvalidArgument(format!(
                "seek target must be finite, got {target}"
            )));
        }
        let duration = match (self.state, self.narration.as_ref()) {
            (PlaybackState::Idle, _) | (_, None) => {
                return Err(NarrationError::InvalidState {
                    operation: "seek",
                    state: self.state,
                })
            }
            (_, Some(narration)) => narration.duration,
        };

        let was_playing = self.state == PlaybackState::Playing;
        self.scheduler.cancel();
        self.stop_source();

        let offset = target.clamp(0.0, duration);
        self.pause_offset = offset;

        if was_playing {
            if let Err(err) = self.start_source(offset) {
                self.set_state(PlaybackState::Paused);
                self.emit_position(offset);
                return Err(err);
            }
            self.schedule_tick();
        } else {
            self.set_state(PlaybackState::Paused);
        }
        self.emit_position(offset);
        Ok(())
    }

    /// Seek to the start of a word.
    pub fn seek_to_word(&mut self, word_index: usize) -> Result<()> {
        let start = self
            .narration
            .as_ref()
            .and_then(|n| n.map.word(word_index))
            .map(|segment| segment.start_time)
            .ok_or_else(|| {
                NarrationError::InvalidArgument(format!("no word with index {word_index}"))
            })?;
        self.seek(start)
    }

    /// Stop playback and release the narration. Idempotent.
    pub fn stop(&mut self) {
        if self.state == PlaybackState::Idle && self.narration.is_none() {
            return;
        }
        self.scheduler.cancel();
        self.stop_source();
        self.release();
        self.set_state(PlaybackState::Idle);
    }

    /// Run the pending tick if it is due. Returns whether a tick ran.
    ///
    /// Hosts call this from their frame or timer loop.
    pub fn poll(&mut self) -> bool {
        match self.scheduler.take_due(self.clock.now()) {
            Some(_) => {
                self.run_tick();
                true
            }
            None => false,
        }
    }

    /// Run a tick delivered by an external timer.
    ///
    /// Stale handles (from before the latest pause/seek/stop) are ignored.
    pub fn handle_tick(&mut self, handle: TickHandle) -> bool {
        if self.scheduler.claim(handle) {
            self.run_tick();
            true
        } else {
            debug!("ignoring stale tick {handle:?}");
            false
        }
    }

    /// Transport state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Seconds consumed before the current run started
    pub fn pause_offset(&self) -> f64 {
        self.pause_offset
    }

    /// Clock timestamp at which the current run started
    pub fn start_clock(&self) -> f64 {
        self.start_clock
    }

    /// Narration position in seconds
    pub fn current_time(&self) -> f64 {
        let Some(narration) = self.narration.as_ref() else {
            return 0.0;
        };
        if self.state == PlaybackState::Playing {
            let run = (self.clock.now() - self.start_clock).max(0.0);
            (self.pause_offset + run).min(narration.duration)
        } else {
            self.pause_offset
        }
    }

    /// Duration of the loaded narration
    pub fn duration(&self) -> Option<f64> {
        self.narration.as_ref().map(|n| n.duration)
    }

    /// Timing map of the loaded narration
    pub fn timing_map(&self) -> Option<Arc<TimingMap>> {
        self.narration.as_ref().map(|n| Arc::clone(&n.map))
    }

    /// Word active at the current position
    pub fn current_word(&self) -> Option<usize> {
        let narration = self.narration.as_ref()?;
        current_word_index(&narration.map, self.current_time())
    }

    /// Pending tick, if the loop is running
    pub fn pending_tick(&self) -> Option<TickHandle> {
        self.scheduler.pending()
    }

    /// Take all events emitted since the last call
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        self.events.drain(..).collect()
    }

    fn run_tick(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let Some(duration) = self.duration() else {
            return;
        };

        let elapsed = self.current_time();
        let source_ended = self.source.as_ref().map_or(true, |s| s.has_ended());
        if source_ended || elapsed >= duration {
            self.finish(duration);
            return;
        }

        self.emit_position(elapsed);
        self.schedule_tick();
    }

    /// Natural end: the narration ran out without an explicit stop.
    fn finish(&mut self, duration: f64) {
        debug!("narration ended at {duration:.2}s");
        self.emit_position(duration);
        self.scheduler.cancel();
        self.stop_source();
        self.release();
        self.set_state(PlaybackState::Idle);
        self.events.push_back(PlaybackEvent::Ended);
    }

    fn start_source(&mut self, offset: f64) -> Result<()> {
        let narration = self.narration.as_ref().ok_or(NarrationError::InvalidState {
            operation: "start source",
            state: self.state,
        })?;

        let started = self
            .factory
            .create_source(&narration.buffer)
            .and_then(|mut source| source.start(offset).map(|()| source));

        match started {
            Ok(source) => {
                self.source = Some(source);
                self.start_clock = self.clock.now();
                Ok(())
            }
            Err(err) => {
                warn!("narration source failed to start at {offset:.2}s: {err}");
                self.events.push_back(PlaybackEvent::Error(err.to_string()));
                Err(err)
            }
        }
    }

    fn stop_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            if let Err(err) = source.stop() {
                debug!("ignoring error while stopping narration source: {err}");
            }
        }
    }

    fn release(&mut self) {
        self.narration = None;
        self.pause_offset = 0.0;
        self.start_clock = 0.0;
        self.tracker.reset();
    }

    fn schedule_tick(&mut self) {
        let due_at = self.clock.now() + self.tick_interval;
        self.scheduler.schedule(due_at);
    }

    fn emit_position(&mut self, elapsed: f64) {
        let Some(narration) = self.narration.as_ref() else {
            return;
        };
        if let Some(position) = self.tracker.observe(&narration.map, elapsed) {
            self.events.push_back(PlaybackEvent::WordChanged(position));
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!("narration {:?} -> {:?}", self.state, state);
            self.state = state;
            self.events.push_back(PlaybackEvent::StateChanged(state));
        }
    }
}
