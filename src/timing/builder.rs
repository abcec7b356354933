//! Timing map construction

use super::tokenizer::{tokenize, Token, TokenKind};
use super::{SegmentKind, TextSegment, TimingMap, TimingWeights};

/// Builds [`TimingMap`]s with a fixed set of weights
#[derive(Debug, Clone, Copy, Default)]
pub struct TimingMapBuilder {
    weights: TimingWeights,
}

/// Build a timing map with the default weights.
///
/// Total: never fails. An empty script yields an empty map; a non-positive or
/// non-finite duration yields zero-width segments at time 0.
pub fn build_timing_map(script: &str, total_duration: f64) -> TimingMap {
    TimingMapBuilder::default().build(script, total_duration)
}

impl TimingMapBuilder {
    /// Create a builder with the given weights
    pub fn with_weights(weights: TimingWeights) -> Self {
        TimingMapBuilder { weights }
    }

    /// Weights in use
    pub fn weights(&self) -> &TimingWeights {
        &self.weights
    }

    /// Build the timing map for `script` spread over `total_duration` seconds.
    pub fn build(&self, script: &str, total_duration: f64) -> TimingMap {
        let duration = if total_duration.is_finite() && total_duration > 0.0 {
            total_duration
        } else {
            0.0
        };

        let tokens = tokenize(script);
        let weights: Vec<f64> = tokens.iter().map(|t| self.weight_of(t)).collect();
        let total_weight: f64 = weights.iter().sum();

        let mut segments = Vec::with_capacity(tokens.len());
        let mut cumulative = 0.0;
        let mut cursor = 0.0;
        let mut word_index = 0;
        let mut sentence_index = 0;
        let mut sentence_has_word = false;
        let last = tokens.len().saturating_sub(1);

        for (position, (token, weight)) in tokens.iter().zip(&weights).enumerate() {
            cumulative += weight;
            // The last segment absorbs accumulated rounding error.
            let end_time = if position == last {
                duration
            } else {
                (duration * cumulative / total_weight).clamp(cursor, duration)
            };

            let (kind, index) = match token.kind {
                TokenKind::Word => {
                    word_index += 1;
                    (SegmentKind::Word, Some(word_index - 1))
                }
                TokenKind::Pause { .. } => (SegmentKind::Pause, None),
                TokenKind::Tag => (SegmentKind::AudioTag, None),
            };

            segments.push(TextSegment {
                kind,
                content: token.text.to_string(),
                start_time: cursor,
                end_time,
                word_index: index,
                sentence_index,
            });
            cursor = end_time;

            if kind == SegmentKind::Word {
                sentence_has_word = true;
                if token.ends_sentence {
                    sentence_index += 1;
                    sentence_has_word = false;
                }
            }
        }

        let sentence_count = sentence_index + usize::from(sentence_has_word);

        // Markers after the final sentence belong to it, not to a phantom next one.
        if sentence_count > 0 {
            let last_sentence = sentence_count - 1;
            for segment in segments.iter_mut().rev() {
                if segment.sentence_index <= last_sentence {
                    break;
                }
                segment.sentence_index = last_sentence;
            }
        }

        TimingMap::from_segments(segments, duration, sentence_count)
    }

    fn weight_of(&self, token: &Token<'_>) -> f64 {
        let weight = match token.kind {
            TokenKind::Word => token.text.chars().count().max(1) as f64,
            TokenKind::Pause { long: false } => self.weights.pause_weight,
            TokenKind::Pause { long: true } => {
                self.weights.pause_weight * self.weights.long_pause_multiplier
            }
            TokenKind::Tag => self.weights.tag_weight,
        };
        if weight.is_finite() && weight > 0.0 {
            weight
        } else {
            1.0
        }
    }
}
