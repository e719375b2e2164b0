//! API key management endpoints
//!
//! Listing and revocation only; keys are issued by the dashboard's
//! provisioning flow, not by this gateway.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::handlers::ErrorResponse;
use crate::api::middleware::{auth_error_response, authenticate};
use crate::db::DbApiKey;
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct KeySummary {
    pub id: Uuid,
    pub key_name: String,
    /// Display form only; the full key is never retrievable.
    pub key_prefix: String,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<DbApiKey> for KeySummary {
    fn from(key: DbApiKey) -> Self {
        KeySummary {
            id: key.id,
            key_name: key.key_name,
            key_prefix: key.key_prefix,
            is_active: key.is_active,
            last_used_at: key.last_used_at,
            created_at: key.created_at,
        }
    }
}

/// List the caller's API keys
#[utoipa::path(
    get,
    path = "/api/v1/keys",
    tag = "keys",
    responses(
        (status = 200, description = "API keys", body = [KeySummary]),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_keys(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let identity = match authenticate(&req, &state).await {
        Ok(identity) => identity,
        Err(err) => return auth_error_response(&err),
    };

    match state.api_keys.list_for_user(identity.user_id).await {
        Ok(keys) => {
            let summaries: Vec<KeySummary> = keys.into_iter().map(KeySummary::from).collect();
            HttpResponse::Ok().json(summaries)
        }
        Err(err) => {
            error!(error = %err, "Failed to list API keys");
            HttpResponse::InternalServerError().json(ErrorResponse::new(
                "Failed to list API keys",
                "KEY_STORE_UNAVAILABLE",
            ))
        }
    }
}

/// Revoke one of the caller's API keys
#[utoipa::path(
    delete,
    path = "/api/v1/keys/{id}",
    tag = "keys",
    responses(
        (status = 200, description = "Key revoked"),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 404, description = "No such active key", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn revoke_key(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> HttpResponse {
    let identity = match authenticate(&req, &state).await {
        Ok(identity) => identity,
        Err(err) => return auth_error_response(&err),
    };

    let key_id = path.into_inner();
    match state.api_keys.deactivate(key_id, identity.user_id).await {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({ "success": true })),
        Ok(false) => HttpResponse::NotFound().json(ErrorResponse::new(
            "No active API key with that id",
            "KEY_NOT_FOUND",
        )),
        Err(err) => {
            error!(key_id = %key_id, error = %err, "Failed to revoke API key");
            HttpResponse::InternalServerError().json(ErrorResponse::new(
                "Failed to revoke API key",
                "KEY_STORE_UNAVAILABLE",
            ))
        }
    }
}
