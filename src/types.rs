//! Core types for media-stager

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Unique identifier for a download
///
/// Generated with UUIDv4 so ids are collision-resistant without any central
/// counter. The id doubles as the name of the download's working directory
/// under the storage root.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct DownloadId(pub Uuid);

impl DownloadId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value
    pub fn get(&self) -> Uuid {
        self.0
    }

    /// Directory name used for this download's working directory
    pub fn dir_name(&self) -> String {
        self.0.to_string()
    }

    /// Parse a directory name back into an id
    ///
    /// Returns `None` for directory names that are not download ids. Used by
    /// the retention sweeper's startup pass to recognize orphaned working
    /// directories without touching unrelated entries in the storage root.
    pub fn parse_dir_name(name: &str) -> Option<Self> {
        Uuid::parse_str(name).ok().map(Self)
    }
}

impl std::fmt::Display for DownloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DownloadId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Download status
///
/// `QUEUED → DOWNLOADING → {READY | FETCH_ERROR | CANCELED}` driven by the
/// underlying job lifecycle, then `READY → RETRIEVING → DONE` driven by the
/// retrieval handler. Any state before `DOWNLOADING` can move directly to
/// `CANCELED`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Admitted, fetch not started yet
    Queued,
    /// The external fetch is running
    Downloading,
    /// Staged file is ready for retrieval
    Ready,
    /// A client is currently streaming the staged file
    Retrieving,
    /// Staged file fully retrieved, working directory reclaimed
    Done,
    /// The fetch or post-processing failed
    FetchError,
    /// Canceled by the client
    Canceled,
}

impl Status {
    /// Whether a staged file may exist in this status
    ///
    /// `target_file` is set if and only if this returns true.
    pub fn has_staged_file(&self) -> bool {
        matches!(self, Status::Ready | Status::Retrieving | Status::Done)
    }
}

/// Request to start a media fetch
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadRequest {
    /// URLs to fetch (at least one required)
    pub urls: Vec<String>,
    /// Extract audio only; the tool picks the format itself
    #[serde(default)]
    pub only_audio: bool,
    /// Fetch only the single item when a URL refers to a playlist
    #[serde(default)]
    pub ignore_playlists: bool,
    /// Requested video quality tier: "best", "fhd" or "hd"
    #[serde(default = "default_video_quality")]
    pub video_quality: String,
}

fn default_video_quality() -> String {
    "best".to_string()
}

/// Public projection of one download record
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadInfo {
    /// Download id
    pub id: DownloadId,
    /// Current status
    pub status: Status,
    /// Staged file name, present once the fetch is ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_file: Option<String>,
    /// When the download reached `done` or `canceled`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Requested URLs
    pub urls: Vec<String>,
    /// Requested audio-only flag
    pub only_audio: bool,
    /// Requested ignore-playlists flag
    pub ignore_playlists: bool,
    /// Requested video quality tier
    pub video_quality: String,
}

/// Event emitted during the download lifecycle
///
/// Broadcast to all subscribers of [`crate::DownloadManager::subscribe`].
/// Events for one download are ordered; no ordering is guaranteed across
/// downloads.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Download admitted to the queue
    Queued {
        /// Download id
        id: DownloadId,
    },
    /// The external fetch started
    Downloading {
        /// Download id
        id: DownloadId,
    },
    /// Staged file is ready for retrieval
    Ready {
        /// Download id
        id: DownloadId,
        /// Staged file name
        target_file: String,
    },
    /// The fetch failed
    Failed {
        /// Download id
        id: DownloadId,
        /// Failure summary (generic, not the raw tool output)
        error: String,
    },
    /// The download was canceled
    Canceled {
        /// Download id
        id: DownloadId,
    },
    /// A client started streaming the staged file
    Retrieving {
        /// Download id
        id: DownloadId,
    },
    /// The staged file was fully retrieved and the working directory removed
    Done {
        /// Download id
        id: DownloadId,
    },
    /// The record was purged by the retention sweeper
    Removed {
        /// Download id
        id: DownloadId,
    },
    /// The manager is shutting down
    Shutdown,
}
