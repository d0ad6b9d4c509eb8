//! Session binding of issued challenge keys.

use humancheck_common::constants::SESSION_KEY_NAMESPACE;
use subtle::ConstantTimeEq;

use crate::session::Session;

/// Records which challenge key a session was issued for a given field salt.
///
/// A newer render under the same salt overwrites the previous binding.
pub struct SessionBinder;

impl SessionBinder {
    /// Session entry name for `salt`
    pub fn session_key(salt: &str) -> String {
        format!("{SESSION_KEY_NAMESPACE}{salt}")
    }

    pub fn bind(session: &mut Session, salt: &str, key: &str) {
        session.insert(Self::session_key(salt), key.to_string());
    }

    /// Whether the session holds `expected` for `salt`
    pub fn check(session: &Session, salt: &str, expected: &str) -> bool {
        match session.get(&Self::session_key(salt)) {
            Some(bound) => bound.as_bytes().ct_eq(expected.as_bytes()).into(),
            None => false,
        }
    }
}
