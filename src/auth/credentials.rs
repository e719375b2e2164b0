//! Credential classification and API key fingerprinting

use sha2::{Digest, Sha256};

/// API keys issued by the dashboard all carry this prefix, which is
/// how a bearer value is told apart from a session JWT.
pub const API_KEY_PREFIX: &str = "bg_";

/// How many leading characters of a key are stored for display.
pub const DISPLAY_PREFIX_LEN: usize = 16;

/// A credential pulled from the Authorization header, before any
/// verification has happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawCredential {
    /// `bg_`-prefixed opaque API key.
    ApiKey(String),
    /// Anything else is treated as a JWT and handed to the verifier.
    Token(String),
}

/// Extract and classify the credential in an Authorization header.
/// The `Bearer ` scheme is stripped when present; older SDK clients
/// send the bare key with no scheme at all. Returns `None` for an
/// empty value.
pub fn extract(header_value: &str) -> Option<RawCredential> {
    let value = header_value
        .strip_prefix("Bearer ")
        .unwrap_or(header_value)
        .trim();
    if value.is_empty() {
        return None;
    }
    if is_api_key(value) {
        Some(RawCredential::ApiKey(value.to_string()))
    } else {
        Some(RawCredential::Token(value.to_string()))
    }
}

pub fn is_api_key(value: &str) -> bool {
    value.starts_with(API_KEY_PREFIX)
}

/// SHA-256 fingerprint of the full key, hex encoded. This is the only
/// form the key is ever stored or looked up in.
pub fn fingerprint(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Non-sensitive display form, e.g. `bg_a1b2c3d4e5f6g`.
pub fn display_prefix(key: &str) -> String {
    key.chars().take(DISPLAY_PREFIX_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_classifies_api_keys_and_tokens() {
        assert_eq!(
            extract("Bearer bg_live_abcdef123456"),
            Some(RawCredential::ApiKey("bg_live_abcdef123456".to_string()))
        );
        assert_eq!(
            extract("Bearer eyJhbGciOiJSUzI1NiJ9.e30.sig"),
            Some(RawCredential::Token("eyJhbGciOiJSUzI1NiJ9.e30.sig".to_string()))
        );
    }

    #[test]
    fn extract_accepts_bare_api_key_without_scheme() {
        assert_eq!(
            extract("bg_live_abcdef123456"),
            Some(RawCredential::ApiKey("bg_live_abcdef123456".to_string()))
        );
    }

    #[test]
    fn extract_rejects_empty_values() {
        assert_eq!(extract(""), None);
        assert_eq!(extract("Bearer "), None);
        assert_eq!(extract("Bearer    "), None);
    }

    #[test]
    fn fingerprint_is_stable_hex_sha256() {
        let fp = fingerprint("bg_test_key");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp, fingerprint("bg_test_key"));
        assert_ne!(fp, fingerprint("bg_test_key2"));
    }

    #[test]
    fn display_prefix_truncates_long_keys() {
        let key = "bg_live_0123456789abcdef0123456789abcdef";
        assert_eq!(display_prefix(key), "bg_live_01234567");
        assert_eq!(display_prefix("bg_short"), "bg_short");
    }
}
