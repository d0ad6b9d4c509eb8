//! Common error types for HumanCheck components.

use thiserror::Error;

/// Errors raised while minting, storing, serving, or validating challenges
#[derive(Debug, Error)]
pub enum HumanCheckError {
    /// Challenge key is absent (stale, already served, or forged)
    #[error("Challenge not found")]
    NotFound,

    /// A record with this key already exists
    #[error("Challenge key already exists: {0}")]
    KeyConflict(String),

    /// Every re-draw during minting hit an existing key
    #[error("Could not mint a unique challenge after {0} attempts")]
    MintExhausted(u32),

    /// Record, blob, or session backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Rendering or encoding of the challenge image failed
    #[error("Image error: {0}")]
    Image(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HumanCheckError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::KeyConflict(_) => 500,
            Self::MintExhausted(_) => 500,
            Self::Storage(_) => 503,
            Self::Image(_) => 500,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
