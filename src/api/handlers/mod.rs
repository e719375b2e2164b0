//! Request handlers

pub mod health;
pub mod info;
pub mod keys;
pub mod remove;
pub mod upload;
pub mod usage;

use actix_web::HttpResponse;
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::api::middleware::Identity;
use crate::db::{CreditError, CreditKind, NewUsageLog};
use crate::AppState;

/// Standard error envelope for JSON endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, error_code: impl Into<String>) -> Self {
        ErrorResponse {
            success: false,
            error: error.into(),
            error_code: error_code.into(),
        }
    }
}

/// Record a usage event off the response path. A failed insert is a
/// log line, never a failed request.
pub fn spawn_usage_log(
    state: &AppState,
    identity: &Identity,
    was_successful: bool,
    error_message: Option<String>,
    processing_time_ms: Option<i32>,
    credit_type_used: Option<CreditKind>,
) {
    let usage = state.usage.clone();
    let entry = NewUsageLog {
        user_id: identity.user_id,
        api_key_id: identity.api_key_id,
        source: identity.source,
        was_successful,
        error_message,
        processing_time_ms,
        credit_type_used,
    };
    tokio::spawn(async move {
        if let Err(err) = usage.record(&entry).await {
            warn!(user_id = %entry.user_id, error = %err, "Failed to record usage");
        }
    });
}

/// Map a credit ledger failure to its HTTP response.
pub fn credit_error_response(err: &CreditError) -> HttpResponse {
    match err {
        CreditError::NoCreditsAvailable => HttpResponse::PaymentRequired().json(
            ErrorResponse::new(
                "No credits available. Purchase credits or enable pay-as-you-go billing.",
                "NO_CREDITS_AVAILABLE",
            ),
        ),
        CreditError::ProfileNotFound(_) => HttpResponse::Forbidden().json(ErrorResponse::new(
            "No billing profile found for this account",
            "PROFILE_NOT_FOUND",
        )),
        CreditError::Db(db_err) => {
            error!(error = %db_err, "Billing store unavailable");
            HttpResponse::InternalServerError().json(ErrorResponse::new(
                "Billing is temporarily unavailable",
                "BILLING_UNAVAILABLE",
            ))
        }
    }
}
