//! Error types for the Reverie platform
//!
//! One enum covers the whole failure taxonomy so that recovery policy can be
//! written as a match on the variant: invalid input is propagated to the
//! caller, corrupted or failed persistence is recovered from locally, and
//! arithmetic failures degrade to neutral fallbacks.

use thiserror::Error;

/// Platform-wide error type
#[derive(Debug, Error)]
pub enum ReverieError {
    /// The caller handed us something unusable (e.g. an empty candidate
    /// list). Propagated; fatal for that request only.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A persisted model blob failed to decode. Recovered by building a
    /// fresh unfitted model in its place.
    #[error("model corrupted: {0}")]
    ModelCorrupted(String),

    /// The model store was unreachable or a write failed. The model stays
    /// dirty and is retried on the next flush; never surfaced to the
    /// selection/update caller.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Arithmetic failed for a single scope (e.g. a non-positive-definite
    /// matrix). The affected scope falls back to a neutral result.
    #[error("computation failure: {0}")]
    Computation(String),

    /// Configuration could not be loaded or validated.
    #[error("configuration error: {message}")]
    Configuration {
        message: String,
        key: Option<String>,
    },
}

impl ReverieError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::ModelCorrupted(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn computation(msg: impl Into<String>) -> Self {
        Self::Computation(msg.into())
    }
}

impl From<sqlx::Error> for ReverieError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReverieError::invalid_argument("no candidates provided");
        assert_eq!(err.to_string(), "invalid argument: no candidates provided");

        let err = ReverieError::Configuration {
            message: "port must be greater than 0".to_string(),
            key: Some("REVERIE_SERVICE_PORT".to_string()),
        };
        assert!(err.to_string().contains("port must be greater than 0"));
    }
}
