//! Keyed one-way encoding of CAPTCHA solutions.
//!
//! `key = hex(HMAC-SHA256(SHA-256(salt || secret), solution))`

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Encodes plaintext solutions into challenge keys
#[derive(Clone)]
pub struct SolutionCodec {
    secret: Vec<u8>,
}

impl SolutionCodec {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Encode `plaintext` within the key space of `salt`.
    ///
    /// Deterministic and case-sensitive. Output is 64 lowercase hex characters.
    pub fn encode(&self, salt: &str, plaintext: &str) -> String {
        let mut derivation = Sha256::new();
        derivation.update(salt.as_bytes());
        derivation.update(&self.secret);
        let mac_key = derivation.finalize();

        let mut mac = match HmacSha256::new_from_slice(&mac_key) {
            Ok(mac) => mac,
            // HMAC takes keys of any length
            Err(_) => unreachable!("HMAC rejected a 32-byte key"),
        };
        mac.update(plaintext.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check `plaintext` against an issued key in constant time
    pub fn verify(&self, salt: &str, plaintext: &str, key: &str) -> bool {
        let encoded = self.encode(salt, plaintext);
        encoded.as_bytes().ct_eq(key.as_bytes()).into()
    }
}

impl std::fmt::Debug for SolutionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolutionCodec")
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn codec() -> SolutionCodec {
        SolutionCodec::new("test-secret")
    }

    #[test]
    fn test_encode_is_deterministic() {
        let codec = codec();
        let first = codec.encode("abc", "hK3ytw");
        for _ in 0..10 {
            assert_eq!(codec.encode("abc", "hK3ytw"), first);
        }
    }

    #[test]
    fn test_encode_is_fixed_length_hex() {
        let key = codec().encode("abc", "hK3ytw");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_encode_is_case_sensitive() {
        let codec = codec();
        assert_ne!(codec.encode("abc", "hK3ytw"), codec.encode("abc", "hk3ytw"));
    }

    #[test]
    fn test_distinct_salts_never_collide() {
        let codec = codec();
        let mut seen = HashSet::new();
        for i in 0..10_000 {
            let key = codec.encode(&format!("salt-{i}"), "hK3ytw");
            assert!(seen.insert(key), "collision at salt-{i}");
        }
    }

    #[test]
    fn test_secret_changes_key_space() {
        let other = SolutionCodec::new("another-secret");
        assert_ne!(codec().encode("abc", "hK3ytw"), other.encode("abc", "hK3ytw"));
    }

    #[test]
    fn test_verify() {
        let codec = codec();
        let key = codec.encode("abc", "hK3ytw");
        assert!(codec.verify("abc", "hK3ytw", &key));
        assert!(!codec.verify("abc", "hk3ytw", &key));
        assert!(!codec.verify("abd", "hK3ytw", &key));
        assert!(!codec.verify("abc", "hK3ytw", ""));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", codec());
        assert!(!rendered.contains("test-secret"));
    }
}
