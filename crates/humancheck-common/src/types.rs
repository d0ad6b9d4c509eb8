//! Core types shared across HumanCheck components.

use serde::{Deserialize, Serialize};

/// A persisted challenge: its lookup key and the blob holding its image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    /// Keyed hash of the solution; also the hidden form value
    pub key: String,

    /// Blob name of the rendered PNG (relative to the media root)
    pub image: String,

    /// Creation timestamp (Unix epoch seconds)
    pub created_at: i64,
}

impl ChallengeRecord {
    pub fn new(key: String, image: String) -> Self {
        Self {
            key,
            image,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Form input names of a rendered challenge field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldNames {
    /// Hidden input carrying the challenge key
    pub hidden: String,

    /// Text input for the typed answer
    pub text: String,
}

/// Response for a freshly rendered challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    /// Challenge key (pre-filled hidden input value)
    pub key: String,

    /// Single-use image URL
    pub image_url: String,

    /// Form input names
    pub fields: FieldNames,
}

/// Result of validating a submitted challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl VerifyResponse {
    pub fn accepted() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![message.into()],
        }
    }
}
