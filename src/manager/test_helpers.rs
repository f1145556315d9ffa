//! Shared helpers for manager tests

use super::DownloadManager;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::process::{CommandPlan, ProcessHandle};
use crate::types::{DownloadId, DownloadRequest, Status};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Fake process executor that fabricates fetch results without spawning
///
/// Dispatches on the planned program's file name: a "yt-dlp" plan writes
/// the configured files into the working directory (optionally failing or
/// blocking first), a "tar" plan writes the archive file named in its
/// arguments.
pub(crate) struct FakeProcessHandle {
    /// File names the fake fetch drops into the working directory
    pub(crate) files: Vec<String>,
    /// Fail the fetch instead of producing files
    pub(crate) fail_fetch: bool,
    /// Block the fetch until notified (or until canceled)
    pub(crate) hold: Option<Arc<Notify>>,
    /// Number of fetch invocations observed
    pub(crate) fetch_calls: Arc<AtomicUsize>,
    /// Number of archive invocations observed
    pub(crate) archive_calls: Arc<AtomicUsize>,
}

impl FakeProcessHandle {
    pub(crate) fn producing(files: &[&str]) -> Self {
        Self {
            files: files.iter().map(|f| f.to_string()).collect(),
            fail_fetch: false,
            hold: None,
            fetch_calls: Arc::new(AtomicUsize::new(0)),
            archive_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_fetch: true,
            ..Self::producing(&[])
        }
    }

    pub(crate) fn holding(files: &[&str], hold: Arc<Notify>) -> Self {
        Self {
            hold: Some(hold),
            ..Self::producing(files)
        }
    }
}

#[async_trait]
impl ProcessHandle for FakeProcessHandle {
    async fn run(&self, plan: &CommandPlan, cancel: &CancellationToken) -> Result<()> {
        let tool = plan
            .program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if tool == "tar" {
            self.archive_calls.fetch_add(1, Ordering::SeqCst);
            // args are ["-cf", <archive>, files...]
            let archive = plan.args.get(1).cloned().expect("archive name argument");
            tokio::fs::write(plan.working_dir.join(archive), b"fake archive")
                .await
                .expect("write fake archive");
            return Ok(());
        }

        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hold) = &self.hold {
            tokio::select! {
                _ = hold.notified() => {}
                _ = cancel.cancelled() => return Err(Error::Canceled),
            }
        }
        if cancel.is_cancelled() {
            return Err(Error::Canceled);
        }
        if self.fail_fetch {
            return Err(Error::ExternalTool("simulated fetch failure".to_string()));
        }
        for file in &self.files {
            tokio::fs::write(plan.working_dir.join(file), b"fake media")
                .await
                .expect("write fake media file");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake-process"
    }
}

/// Config rooted in a fresh temp dir with fake tool paths
pub(crate) fn test_config(root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.storage.root = root.join("store");
    // never executed; the fake dispatches on the file name only
    config.tools.ytdlp_path = Some(PathBuf::from("/fake/yt-dlp"));
    config.tools.tar_path = Some(PathBuf::from("/fake/tar"));
    config
}

/// Started manager backed by a fake process handle and a temp storage root
pub(crate) async fn test_manager(
    handle: FakeProcessHandle,
) -> (DownloadManager, tempfile::TempDir) {
    test_manager_with(handle, |_| {}).await
}

/// Same as [`test_manager`] but with a config tweak hook
pub(crate) async fn test_manager_with(
    handle: FakeProcessHandle,
    tweak: impl FnOnce(&mut Config),
) -> (DownloadManager, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let mut config = test_config(dir.path());
    tweak(&mut config);
    let manager = DownloadManager::with_process_handle(config, Arc::new(handle))
        .await
        .expect("create manager");
    manager.start();
    (manager, dir)
}

/// Request for the given URLs with default options
pub(crate) fn request(urls: &[&str]) -> DownloadRequest {
    DownloadRequest {
        urls: urls.iter().map(|u| u.to_string()).collect(),
        only_audio: false,
        ignore_playlists: false,
        video_quality: "best".to_string(),
    }
}

/// Poll until the download reaches the wanted status
pub(crate) async fn wait_for_status(manager: &DownloadManager, id: DownloadId, wanted: Status) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let info = manager.status(id).await.expect("download exists");
            if info.status == wanted {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for status {wanted:?}"));
}
