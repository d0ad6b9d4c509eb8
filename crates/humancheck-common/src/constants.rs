//! Shared constants for HumanCheck components.

/// Default Redis connection URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8890";

/// Default directory for persisted challenge images
pub const DEFAULT_MEDIA_ROOT: &str = "media";

/// Number of characters in a CAPTCHA solution
pub const SOLUTION_LENGTH: usize = 6;

/// Characters a solution is drawn from.
///
/// Glyphs that read alike at low resolution (0/O, 1/I/l, 5/S, 2/Z, 9/g/q, ...)
/// are left out.
pub const SOLUTION_CHARS: &str = "abcdefhkmnprtuvwxyABCDEFGHJKLMNPRTUVWXY3468";

/// Rendered image size in pixels (width, height)
pub const IMAGE_SIZE: (u32, u32) = (180, 40);

/// Glyph pixel size range, `[min, max)`
pub const FONT_SIZE_RANGE: (u32, u32) = (30, 35);

/// Horizontal cursor start position
pub const BASE_TEXT_OFFSET: i64 = 7;

/// Gap between glyphs, `[min, max)`
pub const GLYPH_GAP_RANGE: (i64, i64) = (-2, 8);

/// Glyph rotation in degrees, `[min, max)`
pub const ROTATION_RANGE: (i32, i32) = (-30, 31);

/// Glyph vertical position, `[min, max)`
pub const GLYPH_Y_RANGE: (i64, i64) = (8, 12);

/// Foreground tint composited through each glyph mask
pub const FOREGROUND_TINT: [u8; 4] = [0xa6, 0xa6, 0xa6, 0xff];

/// Default upper bound on solution re-draws while minting
pub const DEFAULT_MAX_MINT_ATTEMPTS: u32 = 16;

/// Session key namespace for challenge bindings: `HumanCheck{salt}`
pub const SESSION_KEY_NAMESPACE: &str = "HumanCheck";

/// Default session lifetime (two weeks)
pub const DEFAULT_SESSION_TTL_SECS: u64 = 1_209_600;

/// Default name of the session cookie
pub const DEFAULT_SESSION_COOKIE: &str = "humancheck_session";

/// Default form field name; widgets render as `{name}_0` (hidden) and `{name}_1` (text)
pub const DEFAULT_FIELD_NAME: &str = "captcha";

/// Route prefix of the single-view image endpoint
pub const IMAGE_ROUTE_PREFIX: &str = "/captcha/";

/// Blob directory for challenge images, relative to the media root
pub const IMAGE_UPLOAD_DIR: &str = "captcha";

/// Redis key prefixes
pub mod redis_keys {
    /// Challenge record: humancheck:challenge:{key}
    pub const CHALLENGE_PREFIX: &str = "humancheck:challenge:";

    /// Session hash: humancheck:session:{session_id}
    pub const SESSION_PREFIX: &str = "humancheck:session:";
}

/// Field validation messages
pub mod messages {
    pub const REQUIRED: &str = "This field is required.";

    pub const INVALID: &str = "Security code was not entered properly, or has expired.";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_excludes_confusable_glyphs() {
        for c in ['0', 'O', '1', 'I', 'l', '5', 'S', 'g', 'q'] {
            assert!(!SOLUTION_CHARS.contains(c), "{c} should not be drawable");
        }
    }

    #[test]
    fn test_alphabet_has_no_duplicates() {
        let mut chars: Vec<char> = SOLUTION_CHARS.chars().collect();
        let len = chars.len();
        chars.sort_unstable();
        chars.dedup();
        assert_eq!(chars.len(), len);
        assert!(chars.iter().all(|c| c.is_ascii_alphanumeric()));
    }
}
