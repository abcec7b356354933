//! Channel status and failure classification
//!
//! Element failures never escape the background controller as errors; they
//! are turned into an [`AudioIssue`] with a short message and a suggested
//! action for the UI.

use serde::Serialize;

use crate::backend::{Channel, ElementError};

/// Classified background/preview failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueKind {
    /// Playback needs a user gesture first
    AutoplayBlocked,
    /// Source did not become playable in time
    Timeout,
    /// Source could not be fetched
    Network,
    /// Source could not be decoded
    Decode,
    /// Source format not supported
    Unsupported,
    /// Unclassified failure
    Unknown,
}

impl IssueKind {
    /// Short human-readable summary
    pub fn message(self) -> &'static str {
        match self {
            IssueKind::AutoplayBlocked => "Background audio is waiting for permission",
            IssueKind::Timeout => "Background audio took too long to load",
            IssueKind::Network => "Background audio could not be downloaded",
            IssueKind::Decode => "Background audio file is damaged",
            IssueKind::Unsupported => "Background audio format is not supported",
            IssueKind::Unknown => "Background audio stopped unexpectedly",
        }
    }

    /// Suggested user action
    pub fn suggestion(self) -> &'static str {
        match self {
            IssueKind::AutoplayBlocked => "Tap to enable background audio",
            IssueKind::Timeout | IssueKind::Network => "Check your connection and try again",
            IssueKind::Decode | IssueKind::Unsupported => "Choose a different track",
            IssueKind::Unknown => "Try selecting the track again",
        }
    }
}

impl From<&ElementError> for IssueKind {
    fn from(error: &ElementError) -> Self {
        match error {
            ElementError::NotAllowed => IssueKind::AutoplayBlocked,
            ElementError::Network(_) => IssueKind::Network,
            ElementError::Decode(_) => IssueKind::Decode,
            ElementError::Unsupported(_) => IssueKind::Unsupported,
            ElementError::Other(_) => IssueKind::Unknown,
        }
    }
}

/// User-facing description of a channel failure
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioIssue {
    /// Classification
    pub kind: IssueKind,
    /// Human-readable message
    pub message: String,
    /// Suggested action
    pub suggestion: String,
    /// Clock time the issue was raised
    pub raised_at: f64,
    /// Clock time after which the message should no longer be shown
    pub expires_at: f64,
}

impl AudioIssue {
    /// Build an issue raised at `now` that stays visible for `ttl` seconds.
    pub fn new(kind: IssueKind, detail: Option<&str>, now: f64, ttl: f64) -> Self {
        let message = match detail {
            Some(detail) if !detail.is_empty() => format!("{} ({detail})", kind.message()),
            _ => kind.message().to_string(),
        };
        AudioIssue {
            kind,
            message,
            suggestion: kind.suggestion().to_string(),
            raised_at: now,
            expires_at: now + ttl,
        }
    }

    /// Classify an element error.
    pub fn from_element_error(error: &ElementError, now: f64, ttl: f64) -> Self {
        let detail = match error {
            ElementError::Network(d)
            | ElementError::Decode(d)
            | ElementError::Unsupported(d)
            | ElementError::Other(d) => Some(d.as_str()),
            ElementError::NotAllowed => None,
        };
        Self::new(IssueKind::from(error), detail, now, ttl)
    }

    /// Whether the message has outlived its display window
    pub fn is_expired(&self, now: f64) -> bool {
        now >= self.expires_at
    }
}

/// Status of the background or preview channel
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "issue")]
pub enum ChannelStatus {
    /// No element
    #[default]
    Idle,
    /// Element assigned, waiting for data
    Loading,
    /// Audible
    Playing,
    /// Paused by the session
    Paused,
    /// Waiting for a user gesture before playback may start
    Blocked(AudioIssue),
    /// Failed; cleared back to idle once the message expires
    Failed(AudioIssue),
}

impl ChannelStatus {
    /// Check if the channel is audible
    pub fn is_playing(&self) -> bool {
        matches!(self, ChannelStatus::Playing)
    }

    /// Issue attached to this status
    pub fn issue(&self) -> Option<&AudioIssue> {
        match self {
            ChannelStatus::Blocked(issue) | ChannelStatus::Failed(issue) => Some(issue),
            _ => None,
        }
    }
}

/// Events emitted by the background controller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "event")]
pub enum BackgroundEvent {
    /// A channel changed status
    #[serde(rename_all = "camelCase")]
    StatusChanged {
        /// Affected channel
        #[serde(skip)]
        channel: Channel,
        /// New status
        status: ChannelStatus,
    },
    /// Load timed out; retrying once without cross-origin attributes
    #[serde(rename_all = "camelCase")]
    Retrying {
        /// Affected channel
        #[serde(skip)]
        channel: Channel,
        /// Track being retried
        track_id: String,
    },
}
