//! Decoded narration audio

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::{NarrationError, Result};

/// Decoded narration samples with a known duration
///
/// Samples are interleaved `f32` in [-1, 1]. Cloning is cheap: the sample
/// data is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl NarrationBuffer {
    /// Wrap decoded interleaved samples.
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 {
            return Err(NarrationError::InvalidArgument(
                "sample rate must be non-zero".into(),
            ));
        }
        if channels == 0 {
            return Err(NarrationError::InvalidArgument(
                "channel count must be non-zero".into(),
            ));
        }
        Ok(NarrationBuffer {
            samples: samples.into(),
            sample_rate,
            channels,
        })
    }

    /// Silent mono buffer of the given length, for headless runs.
    pub fn silence(duration_secs: f64, sample_rate: u32) -> Result<Self> {
        if !duration_secs.is_finite() || duration_secs < 0.0 {
            return Err(NarrationError::InvalidArgument(format!(
                "invalid buffer duration {duration_secs}"
            )));
        }
        let frames = (duration_secs * sample_rate as f64).round() as usize;
        Self::from_samples(vec![0.0; frames], sample_rate, 1)
    }

    /// Decode a WAV file (integer or float PCM).
    pub fn from_wav_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = hound::WavReader::open(path)?;
        Self::from_wav_reader(reader)
    }

    /// Decode WAV data from any reader.
    pub fn from_wav_bytes<R: Read>(data: R) -> Result<Self> {
        let reader = hound::WavReader::new(data)?;
        Self::from_wav_reader(reader)
    }

    fn from_wav_reader<R: Read>(reader: hound::WavReader<R>) -> Result<Self> {
        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };
        Self::from_samples(samples, spec.sample_rate, spec.channels)
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Shared handle to the sample data
    pub fn shared_samples(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of sample frames
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Index of the first interleaved sample at `offset` seconds, clamped to the buffer.
    pub fn sample_index_at(&self, offset: f64) -> usize {
        if !(offset > 0.0) {
            return 0;
        }
        let frame = (offset * self.sample_rate as f64).floor() as usize;
        frame.min(self.frames()) * self.channels as usize
    }
}
