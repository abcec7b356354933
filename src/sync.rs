//! Word synchronization
//!
//! Resolves which word of a [`TimingMap`] is active at a given narration time.
//! Inside pause and tag segments the previous word stays active, so a UI
//! highlight does not flicker off between words.

use serde::Serialize;

use crate::timing::TimingMap;

/// Active word index at `elapsed` seconds.
///
/// Returns `None` before the first word, for negative or NaN times, and for
/// maps without words. O(log n) in the number of segments.
pub fn current_word_index(map: &TimingMap, elapsed: f64) -> Option<usize> {
    // `!(x >= 0.0)` also rejects NaN
    if map.word_count() == 0 || !(elapsed >= 0.0) {
        return None;
    }
    let after = map
        .segments()
        .partition_point(|segment| segment.start_time <= elapsed);
    if after == 0 {
        return None;
    }
    map.sticky_word_at(after - 1)
}

/// Narration position reported to the UI
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordPosition {
    /// Narration time in seconds
    pub current_time: f64,
    /// Active word, if any
    pub word_index: Option<usize>,
}

/// Change detector on top of [`current_word_index`]
///
/// Remembers the last reported index and only reports differences.
#[derive(Debug, Clone, Default)]
pub struct WordSyncTracker {
    last: Option<Option<usize>>,
}

impl WordSyncTracker {
    /// Create a tracker that has reported nothing yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the word at `elapsed`; `Some` only when it differs from the
    /// previously reported one.
    pub fn observe(&mut self, map: &TimingMap, elapsed: f64) -> Option<WordPosition> {
        let word_index = current_word_index(map, elapsed);
        if self.last == Some(word_index) {
            return None;
        }
        self.last = Some(word_index);
        Some(WordPosition {
            current_time: elapsed,
            word_index,
        })
    }

    /// Last reported word index
    pub fn last_index(&self) -> Option<usize> {
        self.last.flatten()
    }

    /// Forget the last report so the next observation is always emitted
    pub fn reset(&mut self) {
        self.last = None;
    }
}
