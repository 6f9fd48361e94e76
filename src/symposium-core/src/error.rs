//! Error types for the debate system.

use thiserror::Error;

/// Errors reported before a session starts.
///
/// Once a session is validated nothing in the turn loop produces one of
/// these; failing model calls degrade to fallbacks instead.
#[derive(Error, Debug)]
pub enum DebateError {
    #[error("Invalid speaker count: expected at least {min}, got {actual}")]
    InvalidSpeakerCount { min: usize, actual: usize },

    #[error("Speaker #{position} has an empty name")]
    EmptySpeakerName { position: usize },

    #[error("Speaker #{position} has an empty stance")]
    EmptySpeakerStance { position: usize },

    #[error("Duplicate speaker name: {0}")]
    DuplicateSpeaker(String),

    #[error("Debate topic cannot be empty")]
    EmptyTopic,

    #[error("Round budget must be a positive integer")]
    InvalidRoundBudget,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Failure of a single inference call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    /// The call succeeded but the content did not match the expected shape.
    #[error("Malformed model output: {0}")]
    Malformed(String),

    /// Transport-level failure, timeout or server error.
    #[error("Inference unavailable: {0}")]
    Unavailable(String),
}

impl InferenceError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, InferenceError::Malformed(_))
    }
}

impl From<async_openai::error::OpenAIError> for InferenceError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        InferenceError::Unavailable(err.to_string())
    }
}
