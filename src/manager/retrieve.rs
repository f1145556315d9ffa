//! Staged file streaming and completion

use super::DownloadManager;
use crate::error::{DownloadError, Result};
use crate::types::{DownloadId, Event, Status};
use chrono::Utc;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio_util::bytes::Bytes;
use tokio_util::io::ReaderStream;

/// A staged file opened for retrieval
pub struct StagedFile {
    /// Suggested file name for the client
    pub file_name: String,
    /// File size in bytes
    pub size: u64,
    /// Byte chunk stream; draining it to the end completes the download
    pub stream: StagedStream,
}

/// Byte stream over a staged file
///
/// When the stream reaches end-of-file the owning download is completed:
/// the working directory is removed, the record moves to `done` and gets
/// its completion stamp. A consumer that drops the stream early leaves the
/// record `retrieving`; retrieval can simply be retried.
pub struct StagedStream {
    inner: ReaderStream<File>,
    manager: DownloadManager,
    id: DownloadId,
    completed: bool,
}

impl Stream for StagedStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(None) => {
                if !this.completed {
                    this.completed = true;
                    let manager = this.manager.clone();
                    let id = this.id;
                    // Completion runs off the stream's task; the consumer
                    // should not wait on record bookkeeping.
                    tokio::spawn(async move {
                        manager.finish_retrieval(id).await;
                    });
                }
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl DownloadManager {
    /// Open the staged file of a ready download for streaming
    ///
    /// Valid while the status is `ready` or `retrieving` (a disconnected
    /// client may retry). Marks the record `retrieving` once the file is
    /// open. A recorded staged file that is missing on disk is an
    /// inconsistency fault: reported as an internal error, the rest of the
    /// manager's state untouched.
    pub async fn retrieve(&self, id: DownloadId) -> Result<StagedFile> {
        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(&id) else {
            return Err(DownloadError::NotFound { id }.into());
        };
        if !matches!(record.status, Status::Ready | Status::Retrieving) {
            return Err(DownloadError::NotReady {
                id,
                status: record.status,
            }
            .into());
        }
        let Some(file_name) = record.target_file.clone() else {
            // unreachable given the staged-file invariant
            return Err(DownloadError::StageMissing {
                id,
                path: record.workdir.clone(),
            }
            .into());
        };
        let path = record.workdir.join(&file_name);

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::error!(
                    download_id = %id,
                    path = %path.display(),
                    "staged file recorded but missing on disk"
                );
                return Err(DownloadError::StageMissing { id, path }.into());
            }
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata().await?.len();

        record.status = Status::Retrieving;
        drop(records);
        self.emit_event(Event::Retrieving { id });
        tracing::info!(download_id = %id, file = %file_name, size, "retrieval started");

        Ok(StagedFile {
            file_name,
            size,
            stream: StagedStream {
                inner: ReaderStream::new(file),
                manager: self.clone(),
                id,
                completed: false,
            },
        })
    }

    /// Complete a fully streamed retrieval
    ///
    /// `retrieving → done`, completion stamped, working directory removed.
    /// No-op unless the record is still `retrieving`.
    pub(crate) async fn finish_retrieval(&self, id: DownloadId) {
        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(&id) else {
            return;
        };
        if record.status != Status::Retrieving {
            return;
        }
        record.status = Status::Done;
        record.finished_at = Some(Utc::now());
        let workdir = record.workdir.clone();
        drop(records);
        Self::remove_workdir(&workdir).await;
        self.emit_event(Event::Done { id });
        tracing::info!(download_id = %id, "download retrieved and reclaimed");
    }
}
