//! Request authentication
//!
//! Classifies the Authorization header into an API key or a session
//! JWT, verifies it through the matching path, and resolves both to the
//! owning user.

use actix_web::http::header::AUTHORIZATION;
use actix_web::{HttpRequest, HttpResponse};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::handlers::ErrorResponse;
use crate::auth::{credentials, AuthError};
use crate::db::RequestSource;
use crate::AppState;

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    /// Set when the request authenticated with an API key.
    pub api_key_id: Option<Uuid>,
    pub source: RequestSource,
}

/// Authenticate a request from its Authorization header.
pub async fn authenticate(req: &HttpRequest, state: &AppState) -> Result<Identity, AuthError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let credential = credentials::extract(header).ok_or(AuthError::MissingCredentials)?;

    match credential {
        credentials::RawCredential::ApiKey(key) => authenticate_api_key(state, &key).await,
        credentials::RawCredential::Token(token) => {
            let claims = state.verifier.verify(&token).await?;
            let user_id = claims.user_id()?;
            info!(user_id = %user_id, "Authenticated via session token");
            Ok(Identity {
                user_id,
                api_key_id: None,
                source: RequestSource::Dashboard,
            })
        }
    }
}

async fn authenticate_api_key(state: &AppState, key: &str) -> Result<Identity, AuthError> {
    let hash = credentials::fingerprint(key);
    let record = state
        .api_keys
        .find_by_fingerprint(&hash)
        .await
        .map_err(|err| {
            warn!(error = %err, "API key lookup failed");
            AuthError::StoreUnavailable
        })?
        .ok_or(AuthError::ApiKeyInvalid)?;

    // Stamp last_used_at off the request path.
    let repo = state.api_keys.clone();
    let key_id = record.id;
    tokio::spawn(async move {
        if let Err(err) = repo.touch(key_id).await {
            warn!(key_id = %key_id, error = %err, "Failed to stamp API key usage");
        }
    });

    info!(
        user_id = %record.user_id,
        key_id = %record.id,
        key_prefix = %record.key_prefix,
        "Authenticated via API key"
    );

    Ok(Identity {
        user_id: record.user_id,
        api_key_id: Some(record.id),
        source: RequestSource::Sdk,
    })
}

/// Map an authentication failure to its HTTP response.
pub fn auth_error_response(err: &AuthError) -> HttpResponse {
    let body = ErrorResponse::new(err.to_string(), err.code());
    if err.is_unauthorized() {
        HttpResponse::Unauthorized().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
