//! Audio output using rodio
//!
//! [`AudioOutput`] owns the device stream and must stay alive (on the thread
//! that opened it) for as long as anything plays. [`RodioBackend`] handles are
//! cheap to clone and implement both backend seams:
//!
//! - [`SourceFactory`](crate::backend::SourceFactory): narration buffers are
//!   streamed through a fresh sink per start, beginning at the requested
//!   offset.
//! - [`ElementFactory`](crate::backend::ElementFactory): background and
//!   preview tracks are decoded from local files (`path` or `file://path`).

mod element;
mod source;

pub use element::RodioElement;
pub use source::RodioSource;

use rodio::{OutputStream, OutputStreamHandle};

use crate::Result;

/// Open audio device
pub struct AudioOutput {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl AudioOutput {
    /// Open the system default output device
    pub fn open_default() -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| crate::NarrationError::AudioDevice(format!("Failed to open audio stream: {e}")))?;
        log::debug!("audio output opened");
        Ok(AudioOutput {
            _stream: stream,
            handle,
        })
    }

    /// Backend handle playing through this output
    pub fn backend(&self) -> RodioBackend {
        RodioBackend {
            handle: self.handle.clone(),
        }
    }
}

/// Backend playing through an [`AudioOutput`]
#[derive(Clone)]
pub struct RodioBackend {
    handle: OutputStreamHandle,
}
