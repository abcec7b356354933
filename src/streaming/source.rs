//! Narration sources streamed from a decoded buffer

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rodio::{OutputStreamHandle, Sink, Source};

use super::RodioBackend;
use crate::backend::{PlayableSource, SourceFactory};
use crate::buffer::NarrationBuffer;
use crate::{NarrationError, Result};

/// rodio source reading a shared sample buffer from a fixed position
struct BufferSource {
    samples: Arc<[f32]>,
    pos: usize,
    sample_rate: u32,
    channels: u16,
    halted: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl Source for BufferSource {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.samples.len().saturating_sub(self.pos))
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        let frames = self.samples.len().saturating_sub(self.pos) / self.channels as usize;
        Some(Duration::from_secs_f64(frames as f64 / self.sample_rate as f64))
    }
}

impl Iterator for BufferSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.halted.load(Ordering::Relaxed) {
            return None;
        }
        match self.samples.get(self.pos) {
            Some(&sample) => {
                self.pos += 1;
                Some(sample)
            }
            None => {
                self.finished.store(true, Ordering::Relaxed);
                None
            }
        }
    }
}

/// One-shot narration source on its own sink
pub struct RodioSource {
    handle: OutputStreamHandle,
    buffer: NarrationBuffer,
    sink: Option<Sink>,
    halted: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl SourceFactory for RodioBackend {
    type Source = RodioSource;

    fn create_source(&mut self, buffer: &NarrationBuffer) -> Result<RodioSource> {
        Ok(RodioSource {
            handle: self.handle.clone(),
            buffer: buffer.clone(),
            sink: None,
            halted: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl PlayableSource for RodioSource {
    fn start(&mut self, offset: f64) -> Result<()> {
        if self.sink.is_some() {
            return Err(NarrationError::SourceStart("source already started".into()));
        }
        let sink = Sink::try_new(&self.handle)
            .map_err(|e| NarrationError::SourceStart(format!("Failed to create audio sink: {e}")))?;

        sink.append(BufferSource {
            samples: self.buffer.shared_samples(),
            pos: self.buffer.sample_index_at(offset),
            sample_rate: self.buffer.sample_rate(),
            channels: self.buffer.channels(),
            halted: Arc::clone(&self.halted),
            finished: Arc::clone(&self.finished),
        });
        self.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let Some(sink) = self.sink.as_ref() else {
            return Err(NarrationError::Other("source was never started".into()));
        };
        if self.halted.swap(true, Ordering::Relaxed) {
            return Err(NarrationError::Other("source already stopped".into()));
        }
        sink.stop();
        Ok(())
    }

    fn has_ended(&self) -> bool {
        match self.sink.as_ref() {
            Some(sink) => self.finished.load(Ordering::Relaxed) || sink.empty(),
            None => false,
        }
    }
}
