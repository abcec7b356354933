//! Synchronized Narration Playback
//!
//! Plays a pre-rendered narration while tracking which word of the script is
//! being spoken, and optionally mixes in a looping background track that
//! lives in its own failure domain.
//!
//! # Features
//! - Proportional word timing maps built from the script alone (pause and
//!   audio-tag markers included)
//! - Drift-free transport: position is derived from an audio clock, never
//!   accumulated
//! - Play / pause / seek / stop with a strict single-source invariant
//! - Background and preview channels with autoplay, timeout and decode
//!   failure classification
//! - Headless in-memory backend for simulation and tests
//!
//! # Crate feature flags
//! - `streaming` (opt-in): rodio audio output (enables optional `rodio` dep)
//!
//! # Quick start
//! ## Timing map only
//! ```
//! use narration_engine::timing::build_timing_map;
//! let map = build_timing_map("Breathe in. [pause] Breathe out.", 6.0);
//! assert_eq!(map.word_count(), 4);
//! ```
//!
//! ## Headless playback
//! ```
//! use narration_engine::backend::memory::MemoryBackend;
//! use narration_engine::clock::ManualClock;
//! use narration_engine::{NarrationBuffer, PlaybackController};
//!
//! let clock = ManualClock::new();
//! let mut player = PlaybackController::new(clock.clone(), MemoryBackend::new());
//! player.load(NarrationBuffer::silence(3.0, 8_000).unwrap(), "Relax your neck.");
//! player.play().unwrap();
//! clock.advance(1.5);
//! player.poll();
//! assert_eq!(player.current_word(), Some(1));
//! ```

#![warn(missing_docs)]

pub mod backend; // Audio backend seams + in-memory backend
pub mod background; // Background & preview channels
pub mod buffer; // Decoded narration audio
pub mod clock; // Monotonic time sources
pub mod config; // Engine configuration
pub mod error; // Error types
pub mod playback; // Narration transport
pub mod session; // Narration + background command surface
#[cfg(feature = "streaming")]
pub mod streaming; // Audio output (rodio)
pub mod sync; // Word position lookup
pub mod timing; // Timing map construction

pub use error::{NarrationError, Result};

// Public API exports
pub use background::{BackgroundMusicController, BackgroundTrack, ChannelStatus, TrackPreferences};
pub use buffer::NarrationBuffer;
pub use config::EngineConfig;
pub use playback::{PlaybackController, PlaybackEvent, PlaybackState};
pub use session::{NarrationSession, SessionEvent};
#[cfg(feature = "streaming")]
pub use streaming::{AudioOutput, RodioBackend};
pub use sync::{current_word_index, WordPosition};
pub use timing::{build_timing_map, TextSegment, TimingMap};
