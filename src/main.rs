mod api;
mod auth;
mod config;
mod db;
mod gateway;

use std::sync::Arc;
use std::time::Instant;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use tracing::info;
use tracing_actix_web::TracingLogger;

use crate::auth::{JwksCache, TokenVerifier};
use crate::config::Settings;
use crate::db::{ApiKeyRepository, CreditLedger, DbPool, ProfileRepository, UsageRepository};
use crate::gateway::WorkerClient;

/// Shared application state.
pub struct AppState {
    pub settings: Settings,
    pub jwks: Arc<JwksCache>,
    pub verifier: TokenVerifier,
    pub api_keys: ApiKeyRepository,
    pub profiles: ProfileRepository,
    pub usage: UsageRepository,
    pub credits: CreditLedger,
    pub worker: WorkerClient,
    pub started_at: Instant,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bg_gateway=info,actix_web=info".into()),
        )
        .init();

    let settings = Settings::load().expect("Failed to load configuration");
    settings.validate().expect("Invalid configuration");

    // Billing is core; refuse to start without a working database.
    let pool = DbPool::new(
        &settings.database.url,
        settings.database.max_connections,
    )
    .expect("Failed to create database pool");
    pool.test_connection()
        .await
        .expect("Database connection test failed");
    info!("Database connection established");

    let jwks = Arc::new(JwksCache::new(&settings.auth.supabase_url));
    jwks.refresh().await.expect("Initial key set fetch failed");
    let verifier = TokenVerifier::new(jwks.clone(), settings.auth.issuer());

    let worker = WorkerClient::new(
        settings.worker.endpoint.clone(),
        settings.worker.api_key.clone(),
        settings.worker.timeout(),
    );

    let state = web::Data::new(AppState {
        jwks,
        verifier,
        api_keys: ApiKeyRepository::new(pool.clone()),
        profiles: ProfileRepository::new(pool.clone()),
        usage: UsageRepository::new(pool.clone()),
        credits: CreditLedger::new(pool),
        worker,
        started_at: Instant::now(),
        settings: settings.clone(),
    });

    let bind_addr = (settings.server.host.clone(), settings.server.port);
    let workers = settings
        .server
        .workers
        .unwrap_or_else(|| num_cpus::get() * 2);
    let max_payload = settings.server.max_payload_bytes();
    let allowed_origins = settings.cors.allowed_origins.clone();

    info!(
        host = %bind_addr.0,
        port = bind_addr.1,
        workers,
        environment = %settings.server.environment,
        "Starting bg-gateway"
    );

    HttpServer::new(move || {
        let cors = if allowed_origins.is_empty() {
            Cors::permissive()
        } else {
            let mut cors = Cors::default()
                .allowed_methods(vec!["GET", "POST", "DELETE"])
                .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION])
                .max_age(43200);
            for origin in &allowed_origins {
                cors = cors.allowed_origin(origin);
            }
            cors
        };

        App::new()
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(max_payload))
            .app_data(web::PayloadConfig::new(max_payload))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(actix_middleware::Compress::default())
            .wrap(
                actix_middleware::DefaultHeaders::new()
                    .add(("X-Service", "bg-gateway"))
                    .add(("X-Version", env!("CARGO_PKG_VERSION"))),
            )
            .configure(api::configure_routes)
    })
    .workers(workers)
    .bind(bind_addr)?
    .run()
    .await
}
