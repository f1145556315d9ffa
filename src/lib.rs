//! # media-stager
//!
//! Backend library for supervised media fetching: queue a URL fetch backed
//! by an external downloader, follow its lifecycle, retrieve the staged
//! result exactly once, and let retention reclaim the disk afterwards.
//!
//! ## Design Philosophy
//!
//! media-stager is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Cooperative** - Cancellation is signaled, never preemptive
//! - **Self-cleaning** - Every byte staged on disk has a defined reclaim path
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_stager::{Config, DownloadManager, DownloadRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = DownloadManager::new(Config::default()).await?;
//!     manager.start();
//!
//!     // Subscribe to events
//!     let mut events = manager.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let id = manager
//!         .start_download(DownloadRequest {
//!             urls: vec!["https://example.com/video".to_string()],
//!             only_audio: false,
//!             ignore_playlists: true,
//!             video_quality: "best".to_string(),
//!         })
//!         .await?;
//!     println!("download admitted: {id}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Fetch and archive command planning
pub mod fetch;
/// Cancelable, observable units of asynchronous work
pub mod job;
/// Core download manager (decomposed into focused submodules)
pub mod manager;
/// External process execution
pub mod process;
/// Job admission and execution
pub mod scheduler;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, Config, FetchConfig, StorageConfig, ToolsConfig};
pub use error::{ApiError, DownloadError, Error, JobError, Result, ToHttpStatus};
pub use job::{Job, JobEvent, JobIdentity, JobState};
pub use manager::{DownloadManager, StagedFile};
pub use process::{CommandPlan, ProcessHandle, TokioProcessHandle};
pub use scheduler::JobScheduler;
pub use types::{DownloadId, DownloadInfo, DownloadRequest, Event, Status};

/// Helper function to run the manager with graceful signal handling.
///
/// Waits for a termination signal and then calls the manager's
/// `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use media_stager::{Config, DownloadManager, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let manager = DownloadManager::new(Config::default()).await?;
///     manager.start();
///
///     // Run with automatic signal handling
///     run_with_shutdown(manager).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(manager: DownloadManager) -> Result<()> {
    wait_for_signal().await;
    manager.shutdown().await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        _ => {
            tracing::warn!("Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
