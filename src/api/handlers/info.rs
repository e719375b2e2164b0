//! API discovery endpoint

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::gateway::payload::{VALID_FORMATS, VALID_QUALITIES};
use crate::AppState;

pub async fn api_info(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "service": "bg-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "remove_background": "POST /api/v1/remove-background",
            "legacy_upload": "POST /v1/remove-background",
            "usage_stats": "GET /api/v1/usage",
            "usage_activity": "GET /api/v1/usage/activity",
            "api_keys": "GET /api/v1/keys",
            "revoke_key": "DELETE /api/v1/keys/{id}",
            "health": "GET /health",
            "docs": "GET /swagger-ui/",
        },
        "supported_formats": VALID_FORMATS,
        "quality_presets": VALID_QUALITIES,
        "features": {
            "mask_output": true,
            "resize_options": true,
            "api_keys": true,
        },
        "max_file_size_mb": state.settings.server.max_file_size_mb,
        "timeout_seconds": state.settings.worker.timeout_secs,
    }))
}
