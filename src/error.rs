//! Error types for the practice engine

use thiserror::Error;

use crate::session::practice::Phase;

/// Failures reported by an external collaborator (playback, capture, JS callbacks)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("Host callback failed: {0}")]
    Callback(String),
}

/// Core error type
#[derive(Error, Debug)]
pub enum PracticeError {
    #[error("Practice loop already running (phase: {0:?})")]
    AlreadyRunning(Phase),

    #[error("No exercise available: {0}")]
    NoExerciseContent(String),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Audio error: {0}")]
    Audio(String),
}

impl From<serde_json::Error> for PracticeError {
    fn from(e: serde_json::Error) -> Self {
        PracticeError::Serialization(e.to_string())
    }
}

impl From<hound::Error> for PracticeError {
    fn from(e: hound::Error) -> Self {
        PracticeError::Audio(e.to_string())
    }
}

/// Result type alias
pub type PracticeResult<T> = Result<T, PracticeError>;
