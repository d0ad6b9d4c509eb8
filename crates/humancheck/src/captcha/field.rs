//! The two-part CAPTCHA form field.
//!
//! Renders as a hidden input pre-filled with the challenge key (`{name}_0`)
//! and a text input for the answer (`{name}_1`).

use humancheck_common::constants::{IMAGE_ROUTE_PREFIX, messages};
use humancheck_common::{FieldNames, HumanCheckError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use super::binder::SessionBinder;
use super::mint::ChallengeMinter;
use crate::session::Session;

/// User-facing validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// A part of the field was left empty
    #[error("{}", messages::REQUIRED)]
    Required,

    /// Wrong answer, unknown key, or no matching session binding
    #[error("{}", messages::INVALID)]
    Invalid,
}

/// A challenge ready to be shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedChallenge {
    pub key: String,
    pub image_url: String,
    pub fields: FieldNames,
}

/// The submitted `(hidden key, typed answer)` pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub key: String,
    pub text: String,
}

impl Submission {
    /// Surrounding whitespace is not part of either value
    pub fn new(key: impl AsRef<str>, text: impl AsRef<str>) -> Self {
        Self {
            key: key.as_ref().trim().to_string(),
            text: text.as_ref().trim().to_string(),
        }
    }
}

/// A CAPTCHA field instance.
///
/// Its salt is fixed for the lifetime of the instance and scopes every key it
/// issues, so keys minted by one field never validate against another.
pub struct ChallengeField {
    name: String,
    salt: String,
    minter: Arc<ChallengeMinter>,
}

impl ChallengeField {
    /// New field with a random salt
    pub fn new(name: impl Into<String>, minter: Arc<ChallengeMinter>) -> Self {
        Self::with_salt(name, uuid::Uuid::new_v4().to_string(), minter)
    }

    pub fn with_salt(
        name: impl Into<String>,
        salt: impl Into<String>,
        minter: Arc<ChallengeMinter>,
    ) -> Self {
        Self {
            name: name.into(),
            salt: salt.into(),
            minter,
        }
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn field_names(&self) -> FieldNames {
        FieldNames {
            hidden: format!("{}_0", self.name),
            text: format!("{}_1", self.name),
        }
    }

    /// Mint a challenge and bind its key into `session`
    pub async fn render(&self, session: &mut Session) -> Result<RenderedChallenge, HumanCheckError> {
        let key = self.minter.mint(&self.salt).await?;
        SessionBinder::bind(session, &self.salt, &key);

        Ok(RenderedChallenge {
            image_url: format!("{IMAGE_ROUTE_PREFIX}{key}"),
            key,
            fields: self.field_names(),
        })
    }

    /// Pull this field's submission out of decoded form data
    pub fn submission(&self, form: &HashMap<String, String>) -> Submission {
        let names = self.field_names();
        let get = |name: &str| form.get(name).map(String::as_str).unwrap_or_default();
        Submission::new(get(&names.hidden), get(&names.text))
    }

    /// Validate a submission against the key it carries and the session binding.
    ///
    /// Neither the binding nor the stored challenge is consumed.
    pub fn clean(&self, session: &Session, submission: &Submission) -> Result<(), FieldError> {
        if submission.key.is_empty() || submission.text.is_empty() {
            return Err(FieldError::Required);
        }

        let codec = self.minter.codec();
        let key_matches = codec.verify(&self.salt, &submission.text, &submission.key);
        let expected = codec.encode(&self.salt, &submission.text);
        let session_matches = SessionBinder::check(session, &self.salt, &expected);

        if key_matches && session_matches {
            Ok(())
        } else {
            tracing::debug!(field = %self.name, "CAPTCHA submission rejected");
            Err(FieldError::Invalid)
        }
    }
}
