//! Background removal endpoint (versioned JSON API)

use std::collections::HashMap;
use std::time::Instant;

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::api::handlers::{credit_error_response, spawn_usage_log, ErrorResponse};
use crate::api::middleware::{auth_error_response, authenticate};
use crate::gateway::payload;
use crate::gateway::{UpstreamError, WorkerRequest};
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RemoveBackgroundRequest {
    /// Image as a data URL (`data:image/...;base64,...`).
    pub image_data: String,
    /// Quality preset: auto, quality, portrait, product, or speed.
    #[serde(default)]
    pub quality: Option<String>,
    /// Output format: png, jpg, jpeg, webp, or gif.
    #[serde(default)]
    pub format: Option<String>,
    /// Also return the alpha mask as a separate image.
    #[serde(default)]
    pub return_mask: bool,
    /// Resize directives passed through to the worker.
    #[serde(default)]
    pub resize_options: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RemoveBackgroundResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_type_used: Option<String>,
}

impl RemoveBackgroundResponse {
    fn failure(error: impl Into<String>, code: impl Into<String>) -> Self {
        RemoveBackgroundResponse {
            success: false,
            result_image: None,
            mask_image: None,
            error: Some(error.into()),
            error_code: Some(code.into()),
            processing_time_ms: None,
            metadata: None,
            credit_type_used: None,
        }
    }
}

/// Remove the background from an image
#[utoipa::path(
    post,
    path = "/api/v1/remove-background",
    tag = "processing",
    request_body = RemoveBackgroundRequest,
    responses(
        (status = 200, description = "Image processed", body = RemoveBackgroundResponse),
        (status = 400, description = "Invalid request or processing failure", body = RemoveBackgroundResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 402, description = "No credits available", body = ErrorResponse),
        (status = 408, description = "Worker timed out", body = RemoveBackgroundResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_background(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<RemoveBackgroundRequest>,
) -> HttpResponse {
    let started = Instant::now();

    let identity = match authenticate(&req, &state).await {
        Ok(identity) => identity,
        Err(err) => return auth_error_response(&err),
    };

    if let Err(err) = payload::validate_image_data(&body.image_data) {
        return HttpResponse::BadRequest().json(ErrorResponse::new(
            err.to_string(),
            "INVALID_IMAGE_DATA",
        ));
    }

    let quality = body.quality.clone().unwrap_or_else(|| "auto".to_string());
    if let Err(err) = payload::validate_quality(&quality) {
        return HttpResponse::BadRequest()
            .json(ErrorResponse::new(err.to_string(), "INVALID_QUALITY"));
    }

    let format = body.format.clone().unwrap_or_else(|| "png".to_string());
    if let Err(err) = payload::validate_format(&format) {
        return HttpResponse::BadRequest()
            .json(ErrorResponse::new(err.to_string(), "INVALID_FORMAT"));
    }

    // Charge before forwarding; a refused charge never reaches the worker.
    let credit = match state.credits.consume(identity.user_id).await {
        Ok(kind) => kind,
        Err(err) => {
            spawn_usage_log(&state, &identity, false, Some(err.to_string()), None, None);
            return credit_error_response(&err);
        }
    };

    let worker_request = WorkerRequest {
        image: body.image_data.clone(),
        quality: Some(quality),
        format: Some(format),
        return_mask: body.return_mask,
        resize: body.resize_options.clone(),
        debug: state.settings.server.is_development(),
    };

    match state.worker.remove_background(&worker_request).await {
        Ok(resp) if resp.success => {
            let elapsed_ms = started.elapsed().as_millis() as i64;
            let mut metadata = resp.metadata.unwrap_or_default();
            metadata.insert(
                "gateway_processing_time_ms".to_string(),
                serde_json::json!(elapsed_ms),
            );

            spawn_usage_log(
                &state,
                &identity,
                true,
                None,
                Some(elapsed_ms as i32),
                Some(credit),
            );
            info!(user_id = %identity.user_id, elapsed_ms, "Background removed");

            HttpResponse::Ok().json(RemoveBackgroundResponse {
                success: true,
                result_image: resp.image,
                mask_image: resp.mask,
                error: None,
                error_code: None,
                processing_time_ms: Some(elapsed_ms),
                metadata: Some(metadata),
                credit_type_used: Some(credit.as_str().to_string()),
            })
        }
        Ok(resp) => {
            let message = resp
                .error
                .unwrap_or_else(|| "Processing failed".to_string());
            let code = resp.code.unwrap_or_else(|| "PROCESSING_ERROR".to_string());
            warn!(user_id = %identity.user_id, error = %message, "Worker reported failure");
            spawn_usage_log(
                &state,
                &identity,
                false,
                Some(message.clone()),
                Some(started.elapsed().as_millis() as i32),
                Some(credit),
            );
            HttpResponse::BadRequest().json(RemoveBackgroundResponse::failure(message, code))
        }
        Err(err) => {
            warn!(user_id = %identity.user_id, error = %err, "Worker call failed");
            spawn_usage_log(
                &state,
                &identity,
                false,
                Some(err.to_string()),
                Some(started.elapsed().as_millis() as i32),
                Some(credit),
            );
            let body = RemoveBackgroundResponse::failure(err.to_string(), err.code());
            match err {
                UpstreamError::Timeout => HttpResponse::RequestTimeout().json(body),
                UpstreamError::UpstreamRejected { .. } | UpstreamError::InvalidResponse(_) => {
                    HttpResponse::BadGateway().json(body)
                }
                UpstreamError::UpstreamUnavailable(_) => {
                    HttpResponse::ServiceUnavailable().json(body)
                }
            }
        }
    }
}
