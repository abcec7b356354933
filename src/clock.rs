//! Monotonic time sources
//!
//! Narration position is derived from an audio clock rather than wall-clock
//! time, so suspending the host (or adjusting the system time) never shifts
//! the highlighted word.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Monotonic time source, in seconds since an arbitrary origin.
pub trait AudioClock {
    /// Current clock reading. Must never decrease.
    fn now(&self) -> f64;
}

/// Clock backed by [`Instant`], starting at zero when created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose origin is now
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Manually advanced clock for simulation and tests.
///
/// Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    /// Create a clock reading zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward. Negative or non-finite steps are ignored.
    pub fn advance(&self, seconds: f64) {
        if seconds.is_finite() && seconds > 0.0 {
            *self.now.lock() += seconds;
        }
    }

    /// Jump to an absolute reading, never backwards.
    pub fn set(&self, seconds: f64) {
        let mut now = self.now.lock();
        if seconds.is_finite() && seconds > *now {
            *now = seconds;
        }
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}

impl<C: AudioClock + ?Sized> AudioClock for &C {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

impl<C: AudioClock + ?Sized> AudioClock for Arc<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}
