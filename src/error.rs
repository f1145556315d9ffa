//! Error types for media-stager
//!
//! This module provides the error taxonomy for the library:
//! - validation faults (rejected before resources are allocated)
//! - external-process faults (fetch or archive tool failed)
//! - cancellation (a first-class outcome, not a failure)
//! - not-found and inconsistency faults
//! - HTTP status code mapping for API integration

use crate::job::JobState;
use crate::types::{DownloadId, Status};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for media-stager operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-stager
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "storage.root")
        key: Option<String>,
    },

    /// Invalid request input, rejected before any resource is allocated
    #[error("invalid request: {0}")]
    Validation(String),

    /// Unsupported video quality tier
    #[error("unknown video quality tier: {0}")]
    UnknownQuality(String),

    /// Download-related error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Job lifecycle error
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// External tool execution failed (yt-dlp, tar)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// The operation was canceled cooperatively
    #[error("operation canceled")]
    Canceled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shutdown in progress - not accepting new downloads
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Operation not supported (missing binary, not implemented, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Download-related errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Download not found in the record store
    #[error("download {id} not found")]
    NotFound {
        /// The download id that was not found
        id: DownloadId,
    },

    /// Download has no staged file yet (or no longer has one)
    #[error("download {id} is not ready for retrieval (status {status:?})")]
    NotReady {
        /// The download id that was requested
        id: DownloadId,
        /// The current status preventing retrieval
        status: Status,
    },

    /// A staged file is recorded but absent on disk
    ///
    /// Inconsistency fault: reported as an internal error without touching
    /// the manager's state for other downloads.
    #[error("download {id} staged file missing at {path}")]
    StageMissing {
        /// The download id whose staged file is missing
        id: DownloadId,
        /// The path where the staged file was expected
        path: PathBuf,
    },
}

/// Job lifecycle errors
#[derive(Debug, Error)]
pub enum JobError {
    /// Cancel was requested after execution had already been admitted
    #[error("job already started; cancel is only valid before execution")]
    AlreadyStarted,

    /// A state transition that the job state machine does not permit
    #[error("invalid job state transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// The state the job was in
        from: JobState,
        /// The state that was requested
        to: JobState,
    },
}

/// Mapping from domain errors to HTTP status codes and machine-readable codes
pub trait ToHttpStatus {
    /// HTTP status code for this error
    fn status_code(&self) -> u16;
    /// Stable machine-readable error code
    fn error_code(&self) -> &'static str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::UnknownQuality(_) => 422,
            Error::Download(DownloadError::NotFound { .. }) => 404,
            Error::Download(DownloadError::NotReady { .. }) => 409,
            Error::Download(DownloadError::StageMissing { .. }) => 500,
            Error::Job(JobError::AlreadyStarted) => 409,
            Error::Job(JobError::InvalidTransition { .. }) => 500,
            Error::ShuttingDown => 503,
            Error::NotSupported(_) => 501,
            Error::Config { .. }
            | Error::ExternalTool(_)
            | Error::Canceled
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::ApiServerError(_)
            | Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(_) => "invalid_request",
            Error::UnknownQuality(_) => "unknown_quality",
            Error::Download(DownloadError::NotFound { .. }) => "download_not_found",
            Error::Download(DownloadError::NotReady { .. }) => "not_ready",
            Error::Download(DownloadError::StageMissing { .. }) => "stage_missing",
            Error::Job(JobError::AlreadyStarted) => "already_started",
            Error::Job(JobError::InvalidTransition { .. }) => "job_error",
            Error::ExternalTool(_) => "external_tool",
            Error::Canceled => "canceled",
            Error::Io(_) => "io_error",
            Error::ShuttingDown => "shutting_down",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::NotSupported(_) => "not_supported",
            Error::Other(_) => "internal_error",
        }
    }
}

/// Structured JSON error body returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error payload
    pub error: ApiErrorBody,
}

/// Inner error payload with a machine-readable code
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorBody {
    /// Stable machine-readable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError {
            error: ApiErrorBody {
                code: error.error_code().to_string(),
                message: error.to_string(),
            },
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let error = Error::Download(DownloadError::NotFound {
            id: DownloadId::generate(),
        });
        assert_eq!(error.status_code(), 404);
        assert_eq!(error.error_code(), "download_not_found");
    }

    #[test]
    fn test_not_ready_maps_to_409() {
        let error = Error::Download(DownloadError::NotReady {
            id: DownloadId::generate(),
            status: Status::Queued,
        });
        assert_eq!(error.status_code(), 409);
        assert_eq!(error.error_code(), "not_ready");
    }

    #[test]
    fn test_validation_maps_to_400() {
        let error = Error::Validation("at least one URL is required".to_string());
        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), "invalid_request");
    }

    #[test]
    fn test_unknown_quality_maps_to_422() {
        let error = Error::UnknownQuality("ultra".to_string());
        assert_eq!(error.status_code(), 422);
        assert_eq!(error.error_code(), "unknown_quality");
    }

    #[test]
    fn test_shutting_down_maps_to_503() {
        assert_eq!(Error::ShuttingDown.status_code(), 503);
        assert_eq!(Error::ShuttingDown.error_code(), "shutting_down");
    }

    #[test]
    fn test_stage_missing_maps_to_500() {
        let error = Error::Download(DownloadError::StageMissing {
            id: DownloadId::generate(),
            path: PathBuf::from("/tmp/missing"),
        });
        assert_eq!(error.status_code(), 500);
        assert_eq!(error.error_code(), "stage_missing");
    }

    #[test]
    fn test_api_error_carries_code_and_message() {
        let error = Error::UnknownQuality("ultra".to_string());
        let api_error: ApiError = error.into();
        assert_eq!(api_error.error.code, "unknown_quality");
        assert!(api_error.error.message.contains("ultra"));
    }
}
