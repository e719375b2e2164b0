//! Usage statistics and activity endpoints

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::handlers::ErrorResponse;
use crate::api::middleware::{auth_error_response, authenticate};
use crate::db::{CreditError, UsageLog};
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct UsageStatsResponse {
    pub user_id: Uuid,
    pub billing_model: String,
    pub free_images_remaining: i32,
    pub free_images_reset_at: DateTime<Utc>,
    pub bulk_images_remaining: i32,
    pub payg_usage_this_period: i32,
    pub total_images: i64,
    pub images_this_month: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ActivityQuery {
    /// Page size, 1 to 100.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivityEntry {
    pub id: i64,
    pub source: String,
    pub was_successful: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_type_used: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UsageLog> for ActivityEntry {
    fn from(log: UsageLog) -> Self {
        ActivityEntry {
            id: log.id,
            source: log.source,
            was_successful: log.was_successful,
            error_message: log.error_message,
            processing_time_ms: log.processing_time_ms,
            credit_type_used: log.credit_type_used,
            created_at: log.created_at,
        }
    }
}

fn usage_db_error(err: &CreditError) -> HttpResponse {
    match err {
        CreditError::ProfileNotFound(_) => HttpResponse::NotFound().json(ErrorResponse::new(
            "No billing profile found for this account",
            "PROFILE_NOT_FOUND",
        )),
        other => {
            error!(error = %other, "Failed to load usage data");
            HttpResponse::InternalServerError().json(ErrorResponse::new(
                "Failed to load usage data",
                "USAGE_UNAVAILABLE",
            ))
        }
    }
}

/// Current credit balances and usage counters
#[utoipa::path(
    get,
    path = "/api/v1/usage",
    tag = "usage",
    responses(
        (status = 200, description = "Usage statistics", body = UsageStatsResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 404, description = "No billing profile", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_usage_stats(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let identity = match authenticate(&req, &state).await {
        Ok(identity) => identity,
        Err(err) => return auth_error_response(&err),
    };

    let profile = match state.profiles.get(identity.user_id).await {
        Ok(profile) => profile,
        Err(err) => return usage_db_error(&err),
    };

    let counts = match state.usage.counts(identity.user_id).await {
        Ok(counts) => counts,
        Err(err) => return usage_db_error(&CreditError::Db(err)),
    };

    HttpResponse::Ok().json(UsageStatsResponse {
        user_id: profile.id,
        billing_model: profile.current_billing_model,
        free_images_remaining: profile.free_images_remaining,
        free_images_reset_at: profile.free_images_reset_at,
        bulk_images_remaining: profile.bulk_images_remaining,
        payg_usage_this_period: profile.payg_usage_this_period,
        total_images: counts.total_images,
        images_this_month: counts.images_this_month,
    })
}

/// Recent processing activity, newest first
#[utoipa::path(
    get,
    path = "/api/v1/usage/activity",
    tag = "usage",
    params(ActivityQuery),
    responses(
        (status = 200, description = "Activity entries", body = [ActivityEntry]),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_usage_activity(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<ActivityQuery>,
) -> HttpResponse {
    let identity = match authenticate(&req, &state).await {
        Ok(identity) => identity,
        Err(err) => return auth_error_response(&err),
    };

    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    match state
        .usage
        .recent_activity(identity.user_id, limit, offset)
        .await
    {
        Ok(logs) => {
            let entries: Vec<ActivityEntry> = logs.into_iter().map(ActivityEntry::from).collect();
            HttpResponse::Ok().json(entries)
        }
        Err(err) => usage_db_error(&CreditError::Db(err)),
    }
}
