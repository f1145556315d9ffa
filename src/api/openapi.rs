//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the media-stager REST
//! API using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the media-stager REST API
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "media-stager REST API",
        version = "0.1.0",
        description = "REST API for supervised media fetching: queue a download, watch its lifecycle, retrieve the staged file",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6791/api/v1", description = "Local development server")
    ),
    paths(
        // Downloads
        crate::api::routes::start_download,
        crate::api::routes::list_downloads,
        crate::api::routes::get_download,
        crate::api::routes::cancel_download,
        crate::api::routes::download_file,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::DownloadId,
        crate::types::Status,
        crate::types::DownloadRequest,
        crate::types::DownloadInfo,
        crate::types::Event,

        // Config types from config.rs
        crate::config::Config,
        crate::config::StorageConfig,
        crate::config::FetchConfig,
        crate::config::ToolsConfig,
        crate::config::ApiConfig,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ApiErrorBody,
    )),
    tags(
        (name = "downloads", description = "Download management and file retrieval"),
        (name = "system", description = "Health, events and API documentation")
    )
)]
pub struct ApiDoc;
