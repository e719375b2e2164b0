//! Health check endpoint

use actix_web::{web, HttpResponse};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub environment: String,
    pub uptime_seconds: u64,
    pub worker_endpoint_configured: bool,
    pub max_file_size_mb: u64,
    pub timeout_seconds: u64,
}

/// Service health and configuration summary
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: "bg-gateway".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.settings.server.environment.clone(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        worker_endpoint_configured: !state.settings.worker.endpoint.is_empty(),
        max_file_size_mb: state.settings.server.max_file_size_mb,
        timeout_seconds: state.settings.worker.timeout_secs,
    })
}
