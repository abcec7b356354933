//! Silent in-memory backend
//!
//! Records every call so headless runs (and tests) can inspect what the
//! controllers did, and lets callers script failures: rejected source
//! starts, refused `play()` calls, stalled or failing loads.
//!
//! All handles created from one [`MemoryBackend`] share the same log.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    Channel, ElementError, ElementFactory, MediaElement, PlayableSource, Readiness,
    SourceFactory,
};
use crate::buffer::NarrationBuffer;
use crate::{NarrationError, Result};

/// How an element reacts to a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadBehavior {
    /// Ready as soon as it is assigned
    Ready,
    /// Never becomes ready
    Stall,
    /// Stalls with cross-origin attributes, loads without them
    StallWithCrossOrigin,
    /// Fails with the given error
    Fail(ElementError),
}

/// Snapshot of a narration source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    /// Creation order
    pub id: usize,
    /// Offset passed to `start`
    pub start_offset: Option<f64>,
    /// Currently producing output
    pub active: bool,
    /// Dropped by its owner
    pub released: bool,
}

/// Snapshot of a media element
#[derive(Debug, Clone, PartialEq)]
pub struct ElementRecord {
    /// Creation order
    pub id: usize,
    /// Channel the element was created for
    pub channel: Channel,
    /// Assigned source
    pub url: Option<String>,
    /// Cross-origin attributes requested on load
    pub cross_origin: bool,
    /// Loop flag
    pub looping: bool,
    /// Volume
    pub volume: f32,
    /// Currently playing
    pub playing: bool,
    /// Times the position was reset to zero
    pub rewinds: usize,
    /// Playback reached the end
    pub ended: bool,
    /// Dropped by its owner
    pub released: bool,
}

#[derive(Debug, Default)]
struct BackendLog {
    sources: Vec<SourceRecord>,
    elements: Vec<ElementRecord>,
    fail_next_start: Option<String>,
    fail_create: Option<String>,
    rejected_plays: HashMap<Channel, VecDeque<ElementError>>,
    load_behavior: HashMap<String, LoadBehavior>,
}

/// Shared, inspectable silent backend
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    log: Arc<Mutex<BackendLog>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next source `start` fail with `reason`.
    pub fn fail_next_start(&self, reason: impl Into<String>) {
        self.log.lock().fail_next_start = Some(reason.into());
    }

    /// Make the next `create_source` fail with `reason`.
    pub fn fail_next_create(&self, reason: impl Into<String>) {
        self.log.lock().fail_create = Some(reason.into());
    }

    /// Reject the next `play()` on `channel` with `error`.
    pub fn reject_next_play(&self, channel: Channel, error: ElementError) {
        self.log
            .lock()
            .rejected_plays
            .entry(channel)
            .or_default()
            .push_back(error);
    }

    /// Configure how elements react to `url`. Unlisted URLs are ready at once.
    pub fn set_load_behavior(&self, url: impl Into<String>, behavior: LoadBehavior) {
        self.log.lock().load_behavior.insert(url.into(), behavior);
    }

    /// Let the active narration source run out.
    pub fn finish_active_source(&self) {
        let mut log = self.log.lock();
        for source in log.sources.iter_mut().filter(|s| s.active) {
            source.active = false;
        }
    }

    /// Let the playing element on `channel` reach its end.
    pub fn finish_element(&self, channel: Channel) {
        let mut log = self.log.lock();
        for element in log
            .elements
            .iter_mut()
            .filter(|e| e.channel == channel && e.playing && !e.released)
        {
            element.playing = false;
            element.ended = true;
        }
    }

    /// All narration sources created so far
    pub fn sources(&self) -> Vec<SourceRecord> {
        self.log.lock().sources.clone()
    }

    /// Number of narration sources currently producing output
    pub fn active_sources(&self) -> usize {
        self.log.lock().sources.iter().filter(|s| s.active).count()
    }

    /// All elements created for `channel`
    pub fn elements(&self, channel: Channel) -> Vec<ElementRecord> {
        self.log
            .lock()
            .elements
            .iter()
            .filter(|e| e.channel == channel)
            .cloned()
            .collect()
    }

    /// Number of unreleased, playing elements on `channel`
    pub fn playing_elements(&self, channel: Channel) -> usize {
        self.log
            .lock()
            .elements
            .iter()
            .filter(|e| e.channel == channel && e.playing && !e.released)
            .count()
    }

    /// Number of unreleased elements on `channel`
    pub fn live_elements(&self, channel: Channel) -> usize {
        self.log
            .lock()
            .elements
            .iter()
            .filter(|e| e.channel == channel && !e.released)
            .count()
    }
}

/// Narration source produced by [`MemoryBackend`]
#[derive(Debug)]
pub struct MemorySource {
    id: usize,
    started: bool,
    log: Arc<Mutex<BackendLog>>,
}

impl SourceFactory for MemoryBackend {
    type Source = MemorySource;

    fn create_source(&mut self, _buffer: &NarrationBuffer) -> Result<MemorySource> {
        let mut log = self.log.lock();
        if let Some(reason) = log.fail_create.take() {
            return Err(NarrationError::SourceStart(reason));
        }
        let id = log.sources.len();
        log.sources.push(SourceRecord {
            id,
            start_offset: None,
            active: false,
            released: false,
        });
        Ok(MemorySource {
            id,
            started: false,
            log: Arc::clone(&self.log),
        })
    }
}

impl PlayableSource for MemorySource {
    fn start(&mut self, offset: f64) -> Result<()> {
        let mut log = self.log.lock();
        if let Some(reason) = log.fail_next_start.take() {
            return Err(NarrationError::SourceStart(reason));
        }
        if self.started {
            return Err(NarrationError::SourceStart("source already started".into()));
        }
        self.started = true;
        let record = &mut log.sources[self.id];
        record.start_offset = Some(offset);
        record.active = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut log = self.log.lock();
        let record = &mut log.sources[self.id];
        if !record.active {
            return Err(NarrationError::Other("source is not playing".into()));
        }
        record.active = false;
        Ok(())
    }

    fn has_ended(&self) -> bool {
        self.started && !self.log.lock().sources[self.id].active
    }
}

impl Drop for MemorySource {
    fn drop(&mut self) {
        let mut log = self.log.lock();
        let record = &mut log.sources[self.id];
        record.active = false;
        record.released = true;
    }
}

/// Media element produced by [`MemoryBackend`]
#[derive(Debug)]
pub struct MemoryElement {
    id: usize,
    log: Arc<Mutex<BackendLog>>,
}

impl MemoryElement {
    fn with_record<T>(&self, f: impl FnOnce(&mut ElementRecord) -> T) -> T {
        f(&mut self.log.lock().elements[self.id])
    }
}

impl ElementFactory for MemoryBackend {
    type Element = MemoryElement;

    fn create_element(&mut self, channel: Channel) -> MemoryElement {
        let mut log = self.log.lock();
        let id = log.elements.len();
        log.elements.push(ElementRecord {
            id,
            channel,
            url: None,
            cross_origin: false,
            looping: false,
            volume: 1.0,
            playing: false,
            rewinds: 0,
            ended: false,
            released: false,
        });
        MemoryElement {
            id,
            log: Arc::clone(&self.log),
        }
    }
}

impl MediaElement for MemoryElement {
    fn load(&mut self, url: &str, cross_origin: bool) -> std::result::Result<(), ElementError> {
        if url.trim().is_empty() {
            return Err(ElementError::Unsupported("empty source".into()));
        }
        self.with_record(|record| {
            record.url = Some(url.to_string());
            record.cross_origin = cross_origin;
            record.ended = false;
        });
        Ok(())
    }

    fn set_looping(&mut self, looping: bool) {
        self.with_record(|record| record.looping = looping);
    }

    fn set_volume(&mut self, volume: f32) {
        self.with_record(|record| record.volume = volume);
    }

    fn play(&mut self) -> std::result::Result<(), ElementError> {
        let mut log = self.log.lock();
        let channel = log.elements[self.id].channel;
        if let Some(error) = log
            .rejected_plays
            .get_mut(&channel)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        let record = &mut log.elements[self.id];
        record.playing = true;
        record.ended = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.with_record(|record| record.playing = false);
    }

    fn rewind(&mut self) {
        self.with_record(|record| record.rewinds += 1);
    }

    fn readiness(&self) -> Readiness {
        let log = self.log.lock();
        let record = &log.elements[self.id];
        let Some(url) = record.url.as_deref() else {
            return Readiness::Empty;
        };
        if record.ended {
            return Readiness::Ended;
        }
        match log.load_behavior.get(url) {
            None | Some(LoadBehavior::Ready) => Readiness::Ready,
            Some(LoadBehavior::Stall) => Readiness::Loading,
            Some(LoadBehavior::StallWithCrossOrigin) if record.cross_origin => {
                Readiness::Loading
            }
            Some(LoadBehavior::StallWithCrossOrigin) => Readiness::Ready,
            Some(LoadBehavior::Fail(error)) => Readiness::Failed(error.clone()),
        }
    }
}

impl Drop for MemoryElement {
    fn drop(&mut self) {
        self.with_record(|record| {
            record.playing = false;
            record.released = true;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_lifecycle() {
        let mut backend = MemoryBackend::new();
        let buffer = NarrationBuffer::silence(1.0, 100).unwrap();
        let mut source = backend.create_source(&buffer).unwrap();

        assert!(source.stop().is_err());
        source.start(0.25).unwrap();
        assert_eq!(backend.active_sources(), 1);
        assert!(source.start(0.5).is_err());

        source.stop().unwrap();
        assert!(source.stop().is_err());
        assert_eq!(backend.active_sources(), 0);

        drop(source);
        assert!(backend.sources()[0].released);
        assert_eq!(backend.sources()[0].start_offset, Some(0.25));
    }

    #[test]
    fn test_scripted_start_failure() {
        let mut backend = MemoryBackend::new();
        let buffer = NarrationBuffer::silence(1.0, 100).unwrap();
        backend.fail_next_start("device lost");
        let mut source = backend.create_source(&buffer).unwrap();
        assert!(matches!(source.start(0.0), Err(NarrationError::SourceStart(_))));
    }

    #[test]
    fn test_element_readiness_follows_behavior() {
        let mut backend = MemoryBackend::new();
        backend.set_load_behavior("slow.mp3", LoadBehavior::StallWithCrossOrigin);
        let mut element = backend.create_element(Channel::Background);
        assert_eq!(element.readiness(), Readiness::Empty);

        element.load("slow.mp3", true).unwrap();
        assert_eq!(element.readiness(), Readiness::Loading);
        element.load("slow.mp3", false).unwrap();
        assert_eq!(element.readiness(), Readiness::Ready);
    }

    #[test]
    fn test_rejected_play_is_one_shot() {
        let mut backend = MemoryBackend::new();
        backend.reject_next_play(Channel::Preview, ElementError::NotAllowed);
        let mut element = backend.create_element(Channel::Preview);
        element.load("rain.mp3", false).unwrap();
        assert_eq!(element.play(), Err(ElementError::NotAllowed));
        assert_eq!(element.play(), Ok(()));
        assert_eq!(backend.playing_elements(Channel::Preview), 1);
        drop(element);
        assert_eq!(backend.playing_elements(Channel::Preview), 0);
        assert_eq!(backend.live_elements(Channel::Preview), 0);
    }
}
