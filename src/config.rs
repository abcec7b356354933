//! Engine configuration
//!
//! All tunables live here so hosts can ship them as a single JSON document.
//! Every field has a default, so a partial document (or `{}`) is valid.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::timing::TimingWeights;
use crate::{NarrationError, Result};

/// Default narration tick interval (one display frame at 60 Hz).
pub const DEFAULT_TICK_INTERVAL_SECS: f64 = 1.0 / 60.0;

/// Default window a background track has to become playable.
pub const DEFAULT_LOAD_TIMEOUT_SECS: f64 = 15.0;

/// Default background volume.
pub const DEFAULT_BACKGROUND_VOLUME: f32 = 0.3;

/// Default cap on how long a preview may run.
pub const DEFAULT_PREVIEW_LIMIT_SECS: f64 = 15.0;

/// Default lifetime of a user-visible error message.
pub const DEFAULT_STATUS_TTL_SECS: f64 = 5.0;

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Timing-map heuristic weights
    pub timing: TimingWeights,
    /// Narration transport settings
    pub playback: PlaybackConfig,
    /// Background and preview channel settings
    pub background: BackgroundConfig,
}

/// Narration transport settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Delay between word-sync ticks while playing, in seconds
    pub tick_interval_secs: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
        }
    }
}

/// Background and preview channel settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Seconds a track may stay unloaded before the attempt is abandoned
    pub load_timeout_secs: f64,
    /// Initial volume in [0, 1]
    pub volume: f32,
    /// Seconds after which a preview is stopped automatically
    pub preview_limit_secs: f64,
    /// Seconds an error status stays visible before clearing
    pub status_ttl_secs: f64,
    /// Request sources with cross-origin attributes on the first attempt
    pub cross_origin: bool,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        BackgroundConfig {
            load_timeout_secs: DEFAULT_LOAD_TIMEOUT_SECS,
            volume: DEFAULT_BACKGROUND_VOLUME,
            preview_limit_secs: DEFAULT_PREVIEW_LIMIT_SECS,
            status_ttl_secs: DEFAULT_STATUS_TTL_SECS,
            cross_origin: true,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Pretty JSON rendering, e.g. for writing a starter config.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the controllers cannot work with.
    pub fn validate(&self) -> Result<()> {
        self.timing.validate()?;

        let tick = self.playback.tick_interval_secs;
        if !tick.is_finite() || tick <= 0.0 {
            return Err(NarrationError::Config(format!(
                "tick_interval_secs must be positive, got {tick}"
            )));
        }

        let bg = &self.background;
        for (name, value) in [
            ("load_timeout_secs", bg.load_timeout_secs),
            ("preview_limit_secs", bg.preview_limit_secs),
            ("status_ttl_secs", bg.status_ttl_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(NarrationError::Config(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&bg.volume) {
            return Err(NarrationError::Config(format!(
                "volume must be within [0, 1], got {}",
                bg.volume
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_relative_eq!(config.background.load_timeout_secs, 15.0);
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"timing": {"pause_weight": 20.0}}"#).unwrap();
        assert_relative_eq!(config.timing.pause_weight, 20.0);
        assert_relative_eq!(
            config.timing.tag_weight,
            TimingWeights::default().tag_weight
        );
        assert_eq!(config.playback, PlaybackConfig::default());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let err = EngineConfig::from_json_str(r#"{"background": {"volume": 1.5}}"#).unwrap_err();
        assert!(matches!(err, NarrationError::Config(_)));

        let err = EngineConfig::from_json_str(r#"{"playback": {"tick_interval_secs": 0}}"#)
            .unwrap_err();
        assert!(matches!(err, NarrationError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"background": {{"cross_origin": false}}}}"#).unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert!(!config.background.cross_origin);
    }
}
