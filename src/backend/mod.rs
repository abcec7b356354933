//! Audio backend seams
//!
//! The controllers never talk to an audio API directly. Narration goes through
//! [`SourceFactory`] / [`PlayableSource`] (one-shot sources bound to a decoded
//! buffer), background and preview audio go through [`ElementFactory`] /
//! [`MediaElement`] (reusable, URL-backed players with their own loading
//! lifecycle).
//!
//! Two implementations ship with the crate:
//! - [`memory::MemoryBackend`] - silent, inspectable backend for headless runs
//! - `streaming` module (feature `streaming`) - rodio output

pub mod memory;

use crate::buffer::NarrationBuffer;
use crate::Result;

/// Creates narration sources for a loaded buffer
pub trait SourceFactory {
    /// Source type produced by this factory
    type Source: PlayableSource;

    /// Create a fresh, not yet started source bound to `buffer`.
    fn create_source(&mut self, buffer: &NarrationBuffer) -> Result<Self::Source>;
}

/// One-shot narration source
///
/// A source is started at most once; seeking or resuming creates a new one.
pub trait PlayableSource {
    /// Begin output at `offset` seconds into the buffer.
    fn start(&mut self, offset: f64) -> Result<()>;

    /// Halt output. Stopping an idle or already stopped source is an error
    /// that callers are expected to ignore.
    fn stop(&mut self) -> Result<()>;

    /// Whether output reached the end of the buffer on its own.
    fn has_ended(&self) -> bool;
}

/// Player channel an element belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Looping ambience under the narration
    Background,
    /// Short audition of a track
    Preview,
}

/// Loading lifecycle of a media element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// No source assigned
    Empty,
    /// Source assigned, not yet playable
    Loading,
    /// Enough data to play
    Ready,
    /// Non-looping playback reached the end
    Ended,
    /// Loading or playback failed
    Failed(ElementError),
}

/// Failures reported by a media element
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ElementError {
    /// Playback was refused until the user interacts with the page/device
    #[error("Playback not allowed without user interaction")]
    NotAllowed,

    /// Source could not be fetched
    #[error("Network error: {0}")]
    Network(String),

    /// Source was fetched but could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Source format or scheme is not supported
    #[error("Unsupported source: {0}")]
    Unsupported(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

/// Creates media elements for the background and preview channels
pub trait ElementFactory {
    /// Element type produced by this factory
    type Element: MediaElement;

    /// Create a fresh element for `channel`.
    fn create_element(&mut self, channel: Channel) -> Self::Element;
}

/// Reusable URL-backed player
///
/// Dropping an element releases it.
pub trait MediaElement {
    /// Assign a source. Loading may continue asynchronously; see [`Self::readiness`].
    fn load(&mut self, url: &str, cross_origin: bool) -> std::result::Result<(), ElementError>;

    /// Loop at the end of the source
    fn set_looping(&mut self, looping: bool);

    /// Output volume in [0, 1]
    fn set_volume(&mut self, volume: f32);

    /// Request playback. Rejections such as [`ElementError::NotAllowed`] are
    /// reported immediately.
    fn play(&mut self) -> std::result::Result<(), ElementError>;

    /// Pause, keeping the position
    fn pause(&mut self);

    /// Move the position back to the start
    fn rewind(&mut self);

    /// Current loading state
    fn readiness(&self) -> Readiness;
}
