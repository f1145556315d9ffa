//! Retention sweeping and storage hygiene

use super::DownloadManager;
use crate::types::{DownloadId, Event};
use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;

/// Periodic task that purges downloads past the retention window
///
/// Records without a completion stamp are never touched: a staged file
/// that was never retrieved stays available until the client fetches or
/// cancels it.
pub(crate) struct RetentionSweeper {
    manager: DownloadManager,
}

impl RetentionSweeper {
    pub(crate) fn new(manager: DownloadManager) -> Self {
        Self { manager }
    }

    /// Run the sweep loop until the manager shuts down
    ///
    /// Performs the one-time startup hygiene pass first, then sweeps on the
    /// configured fixed interval.
    pub(crate) async fn run(self) {
        self.remove_orphaned_workdirs().await;

        let mut interval = tokio::time::interval(self.manager.config.storage.sweep_interval());
        // the immediate first tick would re-sweep what startup just checked
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => self.sweep_once().await,
                _ = self.manager.shutdown_token.cancelled() => break,
            }
        }
        tracing::debug!("retention sweeper stopped");
    }

    /// Purge every record whose completion stamp is past the retention window
    pub(crate) async fn sweep_once(&self) {
        let retention = self.manager.config.storage.retention();
        let now = Utc::now();

        let expired: Vec<(DownloadId, PathBuf)> = {
            let mut records = self.manager.records.lock().await;
            let expired_ids: Vec<DownloadId> = records
                .values()
                .filter(|record| {
                    record.finished_at.is_some_and(|finished| {
                        now.signed_duration_since(finished)
                            .to_std()
                            .is_ok_and(|age| age > retention)
                    })
                })
                .map(|record| record.id)
                .collect();
            expired_ids
                .into_iter()
                .filter_map(|id| records.remove(&id).map(|r| (id, r.workdir)))
                .collect()
        };

        for (id, workdir) in expired {
            DownloadManager::remove_workdir(&workdir).await;
            self.manager.emit_event(Event::Removed { id });
            tracing::info!(download_id = %id, "expired download purged");
        }
    }

    /// One-time startup scan for working directories left by a crashed
    /// previous process
    ///
    /// Only directories whose names parse as download ids are considered;
    /// anything else under the storage root is left alone. Best-effort:
    /// failures are logged, never fatal.
    pub(crate) async fn remove_orphaned_workdirs(&self) {
        let root = self.manager.config.storage.root.clone();
        let mut entries = match tokio::fs::read_dir(&root).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "storage root scan failed");
                return;
            }
        };

        let live: HashSet<DownloadId> = self.manager.records.lock().await.keys().copied().collect();

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(id) = DownloadId::parse_dir_name(name) else {
                continue;
            };
            if live.contains(&id) {
                continue;
            }
            let is_dir = entry
                .file_type()
                .await
                .map(|file_type| file_type.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            DownloadManager::remove_workdir(&entry.path()).await;
            tracing::info!(download_id = %id, "orphaned working directory removed");
        }
    }
}
