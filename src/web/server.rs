use axum::{routing::get, routing::post, Router};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::astro::SystemClock;
use crate::config::{Config, ConfigError};
use crate::fetch::{self, FetchError};
use crate::orchestrator::{OrchestratorError, OrchestratorOptions, RefreshOrchestrator};

use super::api::auto_refresh as auto_refresh_handlers;
use super::api::current as current_handlers;
use super::api::sky as sky_handlers;
use super::api_doc::ApiDoc;
use super::auth::AppState;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("HTTP client error: {0}")]
    Fetch(#[from] FetchError),
    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Per-city endpoints
        .route("/api/sky/{city}", get(sky_handlers::get_sky))
        .route("/api/sky/{city}/cached", get(sky_handlers::get_cached))
        .route("/api/sky/{city}/state", get(sky_handlers::get_state))
        .route("/api/sky/{city}/refresh", post(sky_handlers::refresh))
        // Current city
        .route("/api/current/sun", get(current_handlers::sun))
        .route("/api/current/moon", get(current_handlers::moon))
        .route("/api/current/daytime", get(current_handlers::daytime))
        .route("/api/current/golden-hour", get(current_handlers::golden_hour))
        .route("/api/current/daylight", get(current_handlers::daylight))
        .route("/api/current/export", get(current_handlers::export))
        // Auto-refresh
        .route(
            "/api/auto-refresh",
            get(auto_refresh_handlers::status)
                .post(auto_refresh_handlers::start)
                .delete(auto_refresh_handlers::stop),
        )
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: Config) -> Result<(), ServeError> {
    let bind_addr = config.web.bind.clone();
    let options = OrchestratorOptions::from_config(&config)?;
    let fetcher = fetch::live_fetcher(&config.services, Arc::new(SystemClock), options.zone)?;
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        fetcher,
        options,
        Arc::new(SystemClock),
    )?);

    // Warm the cache for the default city.
    let _ = orchestrator.refresh(&config.refresh.default_city);
    if let Some(interval) = config.refresh.interval {
        orchestrator.start_auto_refresh(interval)?;
    }

    let state = AppState {
        config: Arc::new(config),
        orchestrator: Arc::clone(&orchestrator),
    };
    let app = router(state);

    log::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator.shutdown();
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown requested");
}
