//! Error types for narration playback

use crate::playback::PlaybackState;

/// Error type for narration engine operations
#[derive(thiserror::Error, Debug)]
pub enum NarrationError {
    /// Operation is not valid in the controller's current state
    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        /// Rejected operation
        operation: &'static str,
        /// State the controller was in
        state: PlaybackState,
    },

    /// Argument outside the accepted domain (e.g. a NaN seek target)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Narration source could not be created or started
    #[error("Source start failed: {0}")]
    SourceStart(String),

    /// Audio device error
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// WAV decoding error
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl NarrationError {
    /// Whether the error is a rejected precondition that left all state untouched.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            NarrationError::InvalidState { .. } | NarrationError::InvalidArgument(_)
        )
    }
}

impl From<String> for NarrationError {
    fn from(msg: String) -> Self {
        NarrationError::Other(msg)
    }
}

impl From<&str> for NarrationError {
    fn from(msg: &str) -> Self {
        NarrationError::Other(msg.to_string())
    }
}

/// Result type for narration engine operations
pub type Result<T> = std::result::Result<T, NarrationError>;
