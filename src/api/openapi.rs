//! OpenAPI documentation

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{
    health::HealthResponse,
    keys::KeySummary,
    remove::{RemoveBackgroundRequest, RemoveBackgroundResponse},
    usage::{ActivityEntry, UsageStatsResponse},
    ErrorResponse,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "BG Gateway API",
        description = "Background removal gateway: authenticated image processing with credit accounting"
    ),
    paths(
        crate::api::handlers::health::health_check,
        crate::api::handlers::remove::remove_background,
        crate::api::handlers::usage::get_usage_stats,
        crate::api::handlers::usage::get_usage_activity,
        crate::api::handlers::keys::list_keys,
        crate::api::handlers::keys::revoke_key,
    ),
    components(schemas(
        HealthResponse,
        RemoveBackgroundRequest,
        RemoveBackgroundResponse,
        UsageStatsResponse,
        ActivityEntry,
        KeySummary,
        ErrorResponse,
    )),
    tags(
        (name = "system", description = "Health and service information"),
        (name = "processing", description = "Background removal"),
        (name = "usage", description = "Credit balances and activity"),
        (name = "keys", description = "API key management"),
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Session JWT or bg_-prefixed API key"))
                        .build(),
                ),
            );
        }
    }
}
