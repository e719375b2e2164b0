//! Legacy multipart upload endpoint
//!
//! Kept for clients predating the JSON API. Accepts a multipart form
//! with an `image` file plus optional `quality` and `format` fields,
//! and responds with raw image bytes instead of a JSON envelope.

use std::time::Instant;

use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use futures::StreamExt;
use serde_json::json;
use tracing::warn;

use crate::api::handlers::{credit_error_response, spawn_usage_log};
use crate::api::middleware::{auth_error_response, authenticate, Identity};
use crate::gateway::payload;
use crate::gateway::{UpstreamError, WorkerRequest};
use crate::db::RequestSource;
use crate::AppState;

struct UploadForm {
    image: Vec<u8>,
    quality: String,
    format: String,
}

async fn read_form(mut form: Multipart, max_bytes: usize) -> Result<UploadForm, HttpResponse> {
    let mut image: Option<Vec<u8>> = None;
    let mut quality = "auto".to_string();
    let mut format = "png".to_string();

    while let Some(item) = form.next().await {
        let mut field = match item {
            Ok(field) => field,
            Err(err) => {
                return Err(HttpResponse::BadRequest()
                    .json(json!({ "error": format!("Malformed multipart body: {err}") })))
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let is_image = field
                    .content_type()
                    .map(|m| m.essence_str().starts_with("image/"))
                    .unwrap_or(false);
                if !is_image {
                    return Err(HttpResponse::BadRequest()
                        .json(json!({ "error": "File must be an image" })));
                }
                let mut buf = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(err) => {
                            return Err(HttpResponse::BadRequest()
                                .json(json!({ "error": format!("Upload read failed: {err}") })))
                        }
                    };
                    if buf.len() + chunk.len() > max_bytes {
                        return Err(HttpResponse::PayloadTooLarge()
                            .json(json!({ "error": "Image exceeds the size limit" })));
                    }
                    buf.extend_from_slice(&chunk);
                }
                image = Some(buf);
            }
            "quality" | "format" => {
                let mut buf = Vec::new();
                while let Some(chunk) = field.next().await {
                    if let Ok(chunk) = chunk {
                        buf.extend_from_slice(&chunk);
                    }
                }
                let value = String::from_utf8_lossy(&buf).trim().to_string();
                if !value.is_empty() {
                    if name == "quality" {
                        quality = value;
                    } else {
                        format = value;
                    }
                }
            }
            _ => {
                // Drain unknown fields so the stream can advance.
                while field.next().await.is_some() {}
            }
        }
    }

    let Some(image) = image else {
        return Err(
            HttpResponse::BadRequest().json(json!({ "error": "No image file provided" }))
        );
    };
    if image.is_empty() {
        return Err(HttpResponse::BadRequest().json(json!({ "error": "Image file is empty" })));
    }

    Ok(UploadForm {
        image,
        quality,
        format,
    })
}

pub async fn upload_image(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: Multipart,
) -> HttpResponse {
    let started = Instant::now();

    let identity = match authenticate(&req, &state).await {
        Ok(identity) => Identity {
            source: RequestSource::Legacy,
            ..identity
        },
        Err(err) => return auth_error_response(&err),
    };

    let form = match read_form(form, state.settings.server.max_payload_bytes()).await {
        Ok(form) => form,
        Err(response) => return response,
    };

    if payload::validate_quality(&form.quality).is_err() {
        return HttpResponse::BadRequest()
            .json(json!({ "error": format!("Invalid quality '{}'", form.quality) }));
    }
    if payload::validate_format(&form.format).is_err() {
        return HttpResponse::BadRequest()
            .json(json!({ "error": format!("Invalid format '{}'", form.format) }));
    }

    let credit = match state.credits.consume(identity.user_id).await {
        Ok(kind) => kind,
        Err(err) => {
            spawn_usage_log(&state, &identity, false, Some(err.to_string()), None, None);
            return credit_error_response(&err);
        }
    };

    let worker_request = WorkerRequest {
        image: payload::encode_image_data(&form.image),
        quality: Some(form.quality),
        format: Some(form.format.clone()),
        return_mask: false,
        resize: None,
        debug: state.settings.server.is_development(),
    };

    match state.worker.remove_background(&worker_request).await {
        Ok(resp) if resp.success => {
            let image_data = match resp.image {
                Some(data) => data,
                None => {
                    spawn_usage_log(
                        &state,
                        &identity,
                        false,
                        Some("Worker returned no image".to_string()),
                        Some(started.elapsed().as_millis() as i32),
                        Some(credit),
                    );
                    return HttpResponse::BadGateway()
                        .json(json!({ "error": "Worker returned no image" }));
                }
            };
            match payload::decode_image_data(&image_data) {
                Ok(bytes) => {
                    spawn_usage_log(
                        &state,
                        &identity,
                        true,
                        None,
                        Some(started.elapsed().as_millis() as i32),
                        Some(credit),
                    );
                    HttpResponse::Ok()
                        .content_type(payload::content_type_for_format(&form.format))
                        .body(bytes)
                }
                Err(err) => {
                    warn!(error = %err, "Worker returned an undecodable image");
                    spawn_usage_log(
                        &state,
                        &identity,
                        false,
                        Some(err.to_string()),
                        Some(started.elapsed().as_millis() as i32),
                        Some(credit),
                    );
                    HttpResponse::BadGateway()
                        .json(json!({ "error": "Worker returned an undecodable image" }))
                }
            }
        }
        Ok(resp) => {
            let message = resp
                .error
                .unwrap_or_else(|| "Processing failed".to_string());
            spawn_usage_log(
                &state,
                &identity,
                false,
                Some(message.clone()),
                Some(started.elapsed().as_millis() as i32),
                Some(credit),
            );
            HttpResponse::BadRequest().json(json!({ "error": message }))
        }
        Err(err) => {
            spawn_usage_log(
                &state,
                &identity,
                false,
                Some(err.to_string()),
                Some(started.elapsed().as_millis() as i32),
                Some(credit),
            );
            let mut builder = match err {
                UpstreamError::Timeout => HttpResponse::RequestTimeout(),
                UpstreamError::UpstreamUnavailable(_) => HttpResponse::ServiceUnavailable(),
                _ => HttpResponse::BadGateway(),
            };
            builder.json(json!({ "error": err.to_string() }))
        }
    }
}
