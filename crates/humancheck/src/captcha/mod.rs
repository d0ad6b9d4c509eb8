//! CAPTCHA generation, minting, and validation.
//!
//! A [`ChallengeField`] renders by minting a challenge (solution, keyed hash,
//! stored image) and binding its key into the caller's session; it validates
//! a submitted `(key, answer)` pair against both the key and the binding.

mod binder;
mod codec;
mod field;
mod generator;
mod glyphs;
mod mint;

pub use codec::SolutionCodec;
pub use field::ChallengeField;
pub use generator::{CaptchaGenerator, sample_solution};
pub use mint::ChallengeMinter;
