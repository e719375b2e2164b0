//! HTTP surface: routes, handlers, middleware, OpenAPI

pub mod handlers;
pub mod middleware;
pub mod openapi;

use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use handlers::{health, info, keys, remove, upload, usage};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route(
                "/remove-background",
                web::post().to(remove::remove_background),
            )
            .service(
                web::scope("/usage")
                    .route("", web::get().to(usage::get_usage_stats))
                    .route("/activity", web::get().to(usage::get_usage_activity)),
            )
            .service(
                web::scope("/keys")
                    .route("", web::get().to(keys::list_keys))
                    .route("/{id}", web::delete().to(keys::revoke_key)),
            ),
    )
    // Pre-SDK clients post multipart forms here.
    .route("/v1/remove-background", web::post().to(upload::upload_image))
    .route("/health", web::get().to(health::health_check))
    .route("/api/info", web::get().to(info::api_info))
    .service(
        SwaggerUi::new("/swagger-ui/{_:.*}")
            .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
    );
}
