//! Background track selection
//!
//! Tracks are plain data. The user's choice and volume survive restarts via
//! [`TrackPreferences`]; the player instance itself is recreated on every
//! start.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Id of the "no background" sentinel track
pub const NONE_TRACK_ID: &str = "none";

/// Broad grouping used by track pickers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackCategory {
    /// The "no background" sentinel
    None,
    /// Rain, waves, forest and similar field recordings
    Nature,
    /// Drones, pads and other textures
    Ambient,
    /// Melodic pieces
    Music,
    /// White, pink or brown noise
    Noise,
    /// Anything not covered above
    #[serde(other)]
    Other,
}

fn default_looping() -> bool {
    true
}

/// A selectable background track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundTrack {
    /// Stable identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Source location; `None` for the sentinel
    #[serde(default)]
    pub url: Option<String>,
    /// Picker grouping
    pub category: TrackCategory,
    /// Loop when used as background
    #[serde(default = "default_looping", rename = "loop")]
    pub looping: bool,
}

impl BackgroundTrack {
    /// Create a looping track
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        category: TrackCategory,
    ) -> Self {
        BackgroundTrack {
            id: id.into(),
            name: name.into(),
            url: Some(url.into()),
            category,
            looping: true,
        }
    }

    /// The "no background" sentinel
    pub fn none() -> Self {
        BackgroundTrack {
            id: NONE_TRACK_ID.to_string(),
            name: "None".to_string(),
            url: None,
            category: TrackCategory::None,
            looping: false,
        }
    }

    /// Check if this track means "no background"
    pub fn is_none(&self) -> bool {
        self.id == NONE_TRACK_ID || self.url.as_deref().map_or(true, |u| u.trim().is_empty())
    }
}

impl Default for BackgroundTrack {
    fn default() -> Self {
        Self::none()
    }
}

/// Ordered list of selectable tracks, always starting with the sentinel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackCatalog {
    tracks: Vec<BackgroundTrack>,
}

impl TrackCatalog {
    /// Build a catalog; the sentinel is added in front when missing.
    pub fn new(tracks: Vec<BackgroundTrack>) -> Self {
        let mut all = Vec::with_capacity(tracks.len() + 1);
        if !tracks.iter().any(|t| t.id == NONE_TRACK_ID) {
            all.push(BackgroundTrack::none());
        }
        all.extend(tracks);
        TrackCatalog { tracks: all }
    }

    /// Parse a JSON array of tracks
    pub fn from_json_str(json: &str) -> Result<Self> {
        let tracks: Vec<BackgroundTrack> = serde_json::from_str(json)?;
        Ok(Self::new(tracks))
    }

    /// Read a JSON array of tracks from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Look up a track by id
    pub fn get(&self, id: &str) -> Option<&BackgroundTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Tracks in a category
    pub fn by_category(&self, category: TrackCategory) -> impl Iterator<Item = &BackgroundTrack> {
        self.tracks.iter().filter(move |t| t.category == category)
    }

    /// All tracks
    pub fn tracks(&self) -> &[BackgroundTrack] {
        &self.tracks
    }

    /// Number of tracks, sentinel included
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Always false: the sentinel is present
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Persisted background choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackPreferences {
    /// Selected track
    pub selected: BackgroundTrack,
    /// Background volume in [0, 1]
    pub volume: f32,
}

impl Default for TrackPreferences {
    fn default() -> Self {
        TrackPreferences {
            selected: BackgroundTrack::none(),
            volume: crate::config::DEFAULT_BACKGROUND_VOLUME,
        }
    }
}

impl TrackPreferences {
    /// Load preferences; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let mut prefs: TrackPreferences = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        prefs.volume = if prefs.volume.is_finite() {
            prefs.volume.clamp(0.0, 1.0)
        } else {
            crate::config::DEFAULT_BACKGROUND_VOLUME
        };
        Ok(prefs)
    }

    /// Write preferences as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
