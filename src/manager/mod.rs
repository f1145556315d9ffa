//! Core download manager split into focused submodules.
//!
//! The `DownloadManager` struct and its methods are organized by domain:
//! - [`start`] - Download admission and fetch execution
//! - [`control`] - Cancellation and status queries
//! - [`retrieve`] - Staged file streaming and completion
//! - [`sweeper`] - Retention sweeping and storage hygiene
//! - [`lifecycle`] - Startup and shutdown coordination

mod control;
mod lifecycle;
mod retrieve;
mod start;
pub(crate) mod sweeper;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use retrieve::{StagedFile, StagedStream};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::job::Job;
use crate::process::{ProcessHandle, TokioProcessHandle, resolve_tool};
use crate::scheduler::JobScheduler;
use crate::types::{DownloadId, DownloadInfo, DownloadRequest, Event, Status};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

/// One tracked download and everything needed to drive it
pub(crate) struct DownloadRecord {
    pub(crate) id: DownloadId,
    pub(crate) request: DownloadRequest,
    pub(crate) workdir: PathBuf,
    pub(crate) status: Status,
    /// Staged file name; set if and only if status is ready/retrieving/done
    pub(crate) target_file: Option<String>,
    /// Completion stamp; set when the download reaches done or canceled
    pub(crate) finished_at: Option<DateTime<Utc>>,
    pub(crate) job: Arc<Job>,
    /// Hand-off slot: the unit of work parks the staged file name here, the
    /// status observer commits it together with the `Ready` transition
    pub(crate) staged: Arc<Mutex<Option<String>>>,
}

impl DownloadRecord {
    pub(crate) fn info(&self) -> DownloadInfo {
        DownloadInfo {
            id: self.id,
            status: self.status,
            target_file: self.target_file.clone(),
            finished_at: self.finished_at,
            urls: self.request.urls.clone(),
            only_audio: self.request.only_audio,
            ignore_playlists: self.request.ignore_playlists,
            video_quality: self.request.video_quality.clone(),
        }
    }
}

/// Main download manager instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct DownloadManager {
    /// Record store keyed by download id
    pub(crate) records: Arc<Mutex<HashMap<DownloadId, DownloadRecord>>>,
    /// Job scheduler driving fetch execution
    pub(crate) scheduler: Arc<JobScheduler>,
    /// External process executor (trait object for pluggable implementations)
    pub(crate) process: Arc<dyn ProcessHandle>,
    /// Resolved path to the yt-dlp binary
    pub(crate) ytdlp: PathBuf,
    /// Resolved path to the tar binary
    pub(crate) tar: PathBuf,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Signals the sweeper and other background tasks to stop
    pub(crate) shutdown_token: CancellationToken,
    /// Flag to indicate whether new downloads are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl DownloadManager {
    /// Create a new DownloadManager instance
    ///
    /// This initializes all core components:
    /// - Creates the storage root directory
    /// - Resolves the external yt-dlp and tar binaries
    /// - Sets up the event broadcast channel and job scheduler
    pub async fn new(config: Config) -> Result<Self> {
        Self::with_process_handle(config, Arc::new(TokioProcessHandle)).await
    }

    /// Create a manager with a custom process executor
    ///
    /// Lets embedders (and tests) substitute how external commands run
    /// without touching any of the orchestration logic.
    pub async fn with_process_handle(
        config: Config,
        process: Arc<dyn ProcessHandle>,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(&config.storage.root)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "failed to create storage root '{}': {}",
                        config.storage.root.display(),
                        e
                    ),
                ))
            })?;

        let ytdlp = resolve_tool(
            "yt-dlp",
            config.tools.ytdlp_path.as_ref(),
            config.tools.search_path,
        )?;
        let tar = resolve_tool(
            "tar",
            config.tools.tar_path.as_ref(),
            config.tools.search_path,
        )?;

        // Buffered so slow subscribers lag instead of blocking the manager
        let (event_tx, _rx) = broadcast::channel(1000);

        let scheduler = Arc::new(JobScheduler::new(config.fetch.max_concurrent_fetches));

        Ok(Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            scheduler,
            process,
            ytdlp,
            tar,
            config: Arc::new(config),
            event_tx,
            shutdown_token: CancellationToken::new(),
            accepting_new: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Subscribe to lifecycle events
    ///
    /// Events for one download arrive in lifecycle order; no ordering is
    /// guaranteed across downloads. Missed events are dropped when a
    /// subscriber lags behind the channel buffer.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Emit an event to all subscribers (no-op when nobody listens)
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Working directory for a download under the storage root
    pub(crate) fn workdir_path(&self, id: DownloadId) -> PathBuf {
        self.config.storage.root.join(id.dir_name())
    }

    /// Best-effort working directory removal, tolerating absence
    pub(crate) async fn remove_workdir(workdir: &Path) {
        match tokio::fs::remove_dir_all(workdir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    workdir = %workdir.display(),
                    error = %e,
                    "failed to remove working directory"
                );
            }
        }
    }
}
