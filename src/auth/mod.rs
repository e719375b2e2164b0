//! Authentication: Supabase JWT verification and API key classification

pub mod credentials;
pub mod jwks;
pub mod verifier;

pub use jwks::JwksCache;
pub use verifier::{Claims, TokenVerifier};

use thiserror::Error;

/// Errors produced while authenticating a request credential.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to fetch signing key set: {0}")]
    KeySetFetch(#[from] reqwest::Error),

    #[error("Key set endpoint returned status {0}")]
    KeySetStatus(reqwest::StatusCode),

    #[error("Unsupported signing algorithm: {0:?}")]
    UnsupportedAlgorithm(jsonwebtoken::Algorithm),

    #[error("Token header has no key id")]
    MissingKeyId,

    #[error("No signing key found for kid '{0}'")]
    UnknownKey(String),

    #[error("Token signature verification failed")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Token is not yet valid")]
    NotYetValid,

    #[error("Token issuer is not trusted")]
    InvalidIssuer,

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token subject is not a valid user id")]
    InvalidSubject,

    #[error("No credentials provided")]
    MissingCredentials,

    #[error("Invalid or inactive API key")]
    ApiKeyInvalid,

    #[error("Credential store unavailable")]
    StoreUnavailable,
}

impl AuthError {
    /// Stable machine-readable code for error responses.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::KeySetFetch(_) | AuthError::KeySetStatus(_) => "KEY_SET_UNAVAILABLE",
            AuthError::UnsupportedAlgorithm(_) => "UNSUPPORTED_ALGORITHM",
            AuthError::MissingKeyId => "MISSING_KEY_ID",
            AuthError::UnknownKey(_) => "UNKNOWN_KEY",
            AuthError::InvalidSignature => "INVALID_SIGNATURE",
            AuthError::Expired => "TOKEN_EXPIRED",
            AuthError::NotYetValid => "TOKEN_NOT_YET_VALID",
            AuthError::InvalidIssuer => "INVALID_ISSUER",
            AuthError::Malformed(_) => "MALFORMED_TOKEN",
            AuthError::InvalidSubject => "INVALID_SUBJECT",
            AuthError::MissingCredentials => "MISSING_CREDENTIALS",
            AuthError::ApiKeyInvalid => "INVALID_API_KEY",
            AuthError::StoreUnavailable => "AUTH_STORE_UNAVAILABLE",
        }
    }

    /// Whether the failure is the caller's fault (401) as opposed to an
    /// infrastructure problem on our side (503).
    pub fn is_unauthorized(&self) -> bool {
        !matches!(
            self,
            AuthError::KeySetFetch(_) | AuthError::KeySetStatus(_) | AuthError::StoreUnavailable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_errors_are_not_unauthorized() {
        assert!(!AuthError::StoreUnavailable.is_unauthorized());
        assert!(!AuthError::KeySetStatus(reqwest::StatusCode::BAD_GATEWAY).is_unauthorized());
    }

    #[test]
    fn credential_errors_are_unauthorized() {
        assert!(AuthError::Expired.is_unauthorized());
        assert!(AuthError::ApiKeyInvalid.is_unauthorized());
        assert!(AuthError::UnknownKey("kid-1".to_string()).is_unauthorized());
    }
}
