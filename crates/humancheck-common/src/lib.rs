//! # HumanCheck Common
//!
//! Shared types, constants, and errors used across HumanCheck components.
//!
//! ## Modules
//! - `types` - Wire and storage data structures (ChallengeRecord, VerifyResponse, etc.)
//! - `error` - Common error taxonomy
//! - `constants` - CAPTCHA geometry, alphabet, and storage key layout

pub mod constants;
pub mod error;
pub mod types;

pub use error::HumanCheckError;
pub use types::*;
