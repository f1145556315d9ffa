//! Cancellation and status queries

use super::DownloadManager;
use crate::error::{DownloadError, Result};
use crate::types::{DownloadId, DownloadInfo, Event, Status};
use chrono::Utc;

impl DownloadManager {
    /// Cancel a download
    ///
    /// Routing depends on how far the download has come:
    /// - fetch not yet executing: the job is canceled and the record is
    ///   `canceled` on return;
    /// - fetch executing: a cooperative abort is requested and the record
    ///   becomes `canceled` shortly after the external process stops;
    /// - already `fetch_error`: marked `canceled` directly, there is no
    ///   process left to stop;
    /// - already `canceled`: no-op.
    ///
    /// Cancel after the staged file is ready does nothing; retention will
    /// reclaim the record.
    pub async fn cancel(&self, id: DownloadId) -> Result<()> {
        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(&id) else {
            return Err(DownloadError::NotFound { id }.into());
        };

        match record.status {
            Status::Canceled => Ok(()),
            Status::FetchError => {
                record.status = Status::Canceled;
                record.finished_at = Some(Utc::now());
                drop(records);
                self.emit_event(Event::Canceled { id });
                tracing::info!(download_id = %id, "failed download marked canceled");
                Ok(())
            }
            Status::Queued | Status::Downloading => {
                let job = record.job.clone();
                if job.cancel("client request").is_ok() {
                    record.status = Status::Canceled;
                    record.finished_at = Some(Utc::now());
                    drop(records);
                    self.emit_event(Event::Canceled { id });
                    tracing::info!(download_id = %id, "download canceled before fetch");
                } else {
                    drop(records);
                    // Already executing: request a cooperative stop. The
                    // status observer flips the record once the job ends.
                    job.abort("client request");
                    tracing::info!(download_id = %id, "download abort requested");
                }
                Ok(())
            }
            Status::Ready | Status::Retrieving | Status::Done => {
                tracing::debug!(
                    download_id = %id,
                    status = ?record.status,
                    "cancel ignored for finished download"
                );
                Ok(())
            }
        }
    }

    /// Snapshot of all tracked downloads
    pub async fn list(&self) -> Vec<DownloadInfo> {
        let records = self.records.lock().await;
        let mut infos: Vec<DownloadInfo> = records.values().map(|r| r.info()).collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Public status projection of one download
    pub async fn status(&self, id: DownloadId) -> Result<DownloadInfo> {
        let records = self.records.lock().await;
        records
            .get(&id)
            .map(|r| r.info())
            .ok_or_else(|| DownloadError::NotFound { id }.into())
    }
}
