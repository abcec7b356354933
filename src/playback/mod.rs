//! Narration Playback Domain
//!
//! Owns the narration transport: the state machine, the single active
//! source, and the tick loop that turns clock time into word positions.
//!
//! Position is derived from an [`AudioClock`](crate::clock::AudioClock):
//! `elapsed = clock.now() - start_clock + pause_offset`. Sources never report
//! their position; they are started at an offset and thrown away on pause or
//! seek.

mod controller;
mod scheduler;


pub use controller::PlaybackController;
pub use scheduler::{TickHandle, TickScheduler};

use serde::Serialize;

use crate::sync::WordPosition;

/// Narration transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing loaded
    #[default]
    Idle,
    /// Narration loaded, never started
    Ready,
    /// Actively playing
    Playing,
    /// Paused (can resume)
    Paused,
}

impl PlaybackState {
    /// Check if a narration is loaded
    pub fn is_loaded(self) -> bool {
        self != PlaybackState::Idle
    }
}

/// Events emitted by the playback controller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "event", content = "data")]
pub enum PlaybackEvent {
    /// Transport changed state
    StateChanged(PlaybackState),
    /// Active word changed
    WordChanged(WordPosition),
    /// Narration played to the end
    Ended,
    /// Start-path failure, already handled
    Error(String),
}
