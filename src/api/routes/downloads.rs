//! Download management handlers.

use crate::api::AppState;
use crate::error::Error;
use crate::types::{DownloadId, DownloadRequest};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

/// POST /downloads - Start a new download
#[utoipa::path(
    post,
    path = "/api/v1/downloads",
    tag = "downloads",
    request_body = DownloadRequest,
    responses(
        (status = 201, description = "Download admitted", body = serde_json::Value),
        (status = 400, description = "No URLs in the request", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn start_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Result<impl IntoResponse, Error> {
    let id = state.manager.start_download(request).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// GET /downloads - List all downloads
#[utoipa::path(
    get,
    path = "/api/v1/downloads",
    tag = "downloads",
    responses(
        (status = 200, description = "Snapshot of all downloads", body = Vec<crate::types::DownloadInfo>)
    )
)]
pub async fn list_downloads(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.list().await)
}

/// GET /downloads/:id - Get single download status
#[utoipa::path(
    get,
    path = "/api/v1/downloads/{id}",
    tag = "downloads",
    params(
        ("id" = DownloadId, Path, description = "Download id")
    ),
    responses(
        (status = 200, description = "Download status projection", body = crate::types::DownloadInfo),
        (status = 404, description = "Download not found", body = crate::error::ApiError)
    )
)]
pub async fn get_download(
    State(state): State<AppState>,
    Path(id): Path<DownloadId>,
) -> Result<impl IntoResponse, Error> {
    let info = state.manager.status(id).await?;
    Ok(Json(info))
}

/// POST /downloads/:id/cancel - Cancel a download
///
/// Cancellation of a running fetch is cooperative; the response is 202 and
/// the status reflects `canceled` once the external process has stopped.
#[utoipa::path(
    post,
    path = "/api/v1/downloads/{id}/cancel",
    tag = "downloads",
    params(
        ("id" = DownloadId, Path, description = "Download id")
    ),
    responses(
        (status = 202, description = "Cancellation accepted"),
        (status = 404, description = "Download not found", body = crate::error::ApiError)
    )
)]
pub async fn cancel_download(
    State(state): State<AppState>,
    Path(id): Path<DownloadId>,
) -> Result<impl IntoResponse, Error> {
    state.manager.cancel(id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "cancel requested" })),
    ))
}

/// GET /downloads/:id/file - Retrieve the staged file
///
/// Streams the staged file; draining the response to the end completes the
/// download and reclaims its working directory.
#[utoipa::path(
    get,
    path = "/api/v1/downloads/{id}/file",
    tag = "downloads",
    params(
        ("id" = DownloadId, Path, description = "Download id")
    ),
    responses(
        (status = 200, description = "Staged file contents", content_type = "application/octet-stream"),
        (status = 404, description = "Download not found", body = crate::error::ApiError),
        (status = 409, description = "Staged file not ready", body = crate::error::ApiError)
    )
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<DownloadId>,
) -> Result<Response, Error> {
    let staged = state.manager.retrieve(id).await?;

    let headers = [
        (
            header::CONTENT_TYPE,
            "application/octet-stream".to_string(),
        ),
        (header::CONTENT_LENGTH, staged.size.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", staged.file_name),
        ),
    ];
    Ok((headers, Body::from_stream(staged.stream)).into_response())
}
