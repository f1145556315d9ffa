//! REST API server module
//!
//! Provides an OpenAPI-documented REST surface over the download manager:
//! start fetches, watch their lifecycle (polling or SSE), retrieve the
//! staged files.

use crate::{Config, DownloadManager, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Downloads
/// - `POST /api/v1/downloads` - Start a download
/// - `GET /api/v1/downloads` - List all downloads
/// - `GET /api/v1/downloads/:id` - Get single download status
/// - `POST /api/v1/downloads/:id/cancel` - Cancel download
/// - `GET /api/v1/downloads/:id/file` - Retrieve the staged file
///
/// ## System
/// - `GET /api/v1/health` - Health check
/// - `GET /api/v1/openapi.json` - OpenAPI specification
/// - `GET /api/v1/events` - Server-sent events stream
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(manager: DownloadManager, config: Arc<Config>) -> Router {
    let state = AppState::new(manager, config.clone());

    let api = Router::new()
        .route("/downloads", post(routes::start_download))
        .route("/downloads", get(routes::list_downloads))
        .route("/downloads/:id", get(routes::get_download))
        .route("/downloads/:id/cancel", post(routes::cancel_download))
        .route("/downloads/:id/file", get(routes::download_file))
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    let router = Router::new().nest("/api/v1", api);

    // Merge Swagger UI routes if enabled in config (before applying state)
    // Note: SwaggerUi reuses the /api/v1/openapi.json endpoint defined above
    let router = if config.api.swagger_ui {
        router.merge(
            SwaggerUi::new("/swagger-ui")
                .config(utoipa_swagger_ui::Config::new(["/api/v1/openapi.json"])),
        )
    } else {
        router
    };

    let router = router
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config
    if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins ("*" allows any origin)
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address
///
/// Binds a TCP listener and serves the router until the manager shuts
/// down. The manager should already be started.
///
/// # Example
///
/// ```no_run
/// use media_stager::{Config, DownloadManager};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let manager = DownloadManager::new((*config).clone()).await?;
/// manager.start();
///
/// // Serve the API (blocks until shutdown)
/// media_stager::api::start_api_server(manager, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(manager: DownloadManager, config: Arc<Config>) -> Result<()> {
    let bind_address = config.api.bind_address;
    let shutdown = manager.shutdown_token.clone();

    let app = create_router(manager, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}
