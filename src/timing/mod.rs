//! Word Timing Domain
//!
//! Turns a narration script and the duration of its synthesized audio into a
//! [`TimingMap`]: a contiguous, time-ordered list of text segments covering
//! the whole narration.
//!
//! The timing is a heuristic. Each token gets a weight (character count for
//! words, a fixed weight for pause and audio-tag markers) and the cumulative
//! weights are mapped proportionally onto `[0, duration]`. No acoustic
//! alignment takes place.
//!
//! ```
//! use narration_engine::timing::build_timing_map;
//!
//! let map = build_timing_map("Breathe in. Breathe out.", 10.0);
//! assert_eq!(map.word_count(), 4);
//! assert_eq!(map.sentence_count(), 2);
//! assert_eq!(map.segments().last().unwrap().end_time, 10.0);
//! ```

mod builder;
mod tokenizer;

pub use builder::{build_timing_map, TimingMapBuilder};

use serde::{Deserialize, Serialize};

use crate::{NarrationError, Result};

/// Kind of a timed segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SegmentKind {
    /// Spoken word
    Word,
    /// Silence requested by a pause marker
    Pause,
    /// Non-spoken delivery marker such as `[whispers]`
    AudioTag,
}

/// One time-bounded piece of the script
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegment {
    /// Segment kind
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    /// Script text, including attached punctuation
    pub content: String,
    /// Start time in seconds
    pub start_time: f64,
    /// End time in seconds
    pub end_time: f64,
    /// Index among word segments; `None` for pauses and tags
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_index: Option<usize>,
    /// Sentence this segment belongs to
    pub sentence_index: usize,
}

impl TextSegment {
    /// Check if this segment is a spoken word
    pub fn is_word(&self) -> bool {
        self.kind == SegmentKind::Word
    }

    /// Segment length in seconds
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Immutable timing map for a single narration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingMap {
    segments: Vec<TextSegment>,
    total_duration: f64,
    word_count: usize,
    sentence_count: usize,
    /// Segment position of every word, indexed by word index
    #[serde(skip)]
    word_positions: Vec<usize>,
    /// Latest word at or before each segment (sticky highlight)
    #[serde(skip)]
    sticky_words: Vec<Option<usize>>,
}

impl TimingMap {
    pub(crate) fn from_segments(
        segments: Vec<TextSegment>,
        total_duration: f64,
        sentence_count: usize,
    ) -> Self {
        let mut word_positions = Vec::new();
        let mut sticky_words = Vec::with_capacity(segments.len());
        let mut last_word = None;
        for (position, segment) in segments.iter().enumerate() {
            if let Some(index) = segment.word_index {
                word_positions.push(position);
                last_word = Some(index);
            }
            sticky_words.push(last_word);
        }

        TimingMap {
            word_count: word_positions.len(),
            segments,
            total_duration,
            sentence_count,
            word_positions,
            sticky_words,
        }
    }

    /// All segments in time order
    pub fn segments(&self) -> &[TextSegment] {
        &self.segments
    }

    /// Narration duration the map spans, in seconds
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// Number of word segments
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Number of sentences containing at least one word
    pub fn sentence_count(&self) -> usize {
        self.sentence_count
    }

    /// Check if the map holds no segments at all
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Word segment by word index
    pub fn word(&self, word_index: usize) -> Option<&TextSegment> {
        self.word_positions
            .get(word_index)
            .map(|&position| &self.segments[position])
    }

    /// Iterate over word segments only
    pub fn words(&self) -> impl Iterator<Item = &TextSegment> + '_ {
        self.word_positions
            .iter()
            .map(move |&position| &self.segments[position])
    }

    /// Time span `(start, end)` of a sentence
    pub fn sentence_span(&self, sentence_index: usize) -> Option<(f64, f64)> {
        let mut matching = self
            .segments
            .iter()
            .filter(|s| s.sentence_index == sentence_index);
        let first = matching.next()?;
        let end = matching.last().map_or(first.end_time, |s| s.end_time);
        Some((first.start_time, end))
    }

    /// Latest word at or before the segment at `position`
    pub(crate) fn sticky_word_at(&self, position: usize) -> Option<usize> {
        self.sticky_words.get(position).copied().flatten()
    }

    /// JSON rendering for UI collaborators
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Tunable weights for the timing heuristic
///
/// Words weigh their character count (at least 1). The other weights are in
/// the same unit: a pause weight of 12 lasts about as long as a 12-letter
/// word.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingWeights {
    /// Weight of a `[pause]` marker
    pub pause_weight: f64,
    /// Multiplier applied to `[long pause]` markers
    pub long_pause_multiplier: f64,
    /// Weight of any other bracketed marker
    pub tag_weight: f64,
}

impl Default for TimingWeights {
    fn default() -> Self {
        TimingWeights {
            pause_weight: 12.0,
            long_pause_multiplier: 2.0,
            tag_weight: 3.0,
        }
    }
}

impl TimingWeights {
    /// Reject weights that would break proportional mapping.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("pause_weight", self.pause_weight),
            ("tag_weight", self.tag_weight),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(NarrationError::Config(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !self.long_pause_multiplier.is_finite() || self.long_pause_multiplier < 1.0 {
            return Err(NarrationError::Config(format!(
                "long_pause_multiplier must be at least 1, got {}",
                self.long_pause_multiplier
            )));
        }
        Ok(())
    }
}
