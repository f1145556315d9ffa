//! Download admission and fetch execution

use super::{DownloadManager, DownloadRecord};
use crate::error::{Error, Result};
use crate::fetch;
use crate::job::{Job, JobEvent, JobIdentity, JobState, UnitOfWork};
use crate::process::ProcessHandle;
use crate::types::{DownloadId, DownloadRequest, Event, Status};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

impl DownloadManager {
    /// Admit a new download
    ///
    /// Validates the request, creates the record in `queued`, and hands the
    /// fetch job to the scheduler. Returns the id immediately; progress is
    /// observable through [`DownloadManager::status`] and
    /// [`DownloadManager::subscribe`].
    ///
    /// The quality tier is deliberately not validated here: an unknown tier
    /// fails inside the fetch job and surfaces as a `fetch_error` download,
    /// the same way any other fetch problem does.
    pub async fn start_download(&self, request: DownloadRequest) -> Result<DownloadId> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        if request.urls.is_empty() {
            return Err(Error::Validation("at least one URL is required".to_string()));
        }

        let id = DownloadId::generate();
        let workdir = self.workdir_path(id);
        let staged = Arc::new(Mutex::new(None));

        let work = self.fetch_work(id, request.clone(), workdir.clone(), staged.clone());
        let identity = JobIdentity::new("media-fetch").subject("download_id", id.to_string());
        let job = Arc::new(Job::new(identity, work));
        // Subscribe before scheduling so no transition can be missed.
        let job_events = job.subscribe();

        let record = DownloadRecord {
            id,
            request,
            workdir,
            status: Status::Queued,
            target_file: None,
            finished_at: None,
            job: job.clone(),
            staged,
        };
        self.records.lock().await.insert(id, record);
        self.spawn_status_observer(id, job.clone(), job_events);
        self.emit_event(Event::Queued { id });

        if let Err(e) = self.scheduler.run(job) {
            self.records.lock().await.remove(&id);
            return Err(e);
        }

        tracing::info!(download_id = %id, "download admitted");
        Ok(id)
    }

    /// Build the unit of work for one fetch
    ///
    /// On any failure the working directory is removed before the error
    /// propagates, so failed fetches never leak disk space.
    fn fetch_work(
        &self,
        id: DownloadId,
        request: DownloadRequest,
        workdir: PathBuf,
        staged: Arc<Mutex<Option<String>>>,
    ) -> UnitOfWork {
        let process = self.process.clone();
        let ytdlp = self.ytdlp.clone();
        let tar = self.tar.clone();
        Box::new(move |cancel| {
            Box::pin(async move {
                let result = run_fetch(
                    process, &ytdlp, &tar, id, &request, &workdir, &staged, cancel,
                )
                .await;
                if result.is_err() {
                    Self::remove_workdir(&workdir).await;
                }
                result
            })
        })
    }

    /// Map job lifecycle events onto the download record
    ///
    /// One observer task per download; it ends when the job reaches a
    /// terminal state and its event channel closes.
    fn spawn_status_observer(
        &self,
        id: DownloadId,
        job: Arc<Job>,
        mut job_events: mpsc::UnboundedReceiver<JobEvent>,
    ) {
        let manager = self.clone();
        tokio::spawn(async move {
            while let Some(event) = job_events.recv().await {
                match event {
                    JobEvent::Running => manager.on_fetch_running(id).await,
                    JobEvent::Done => manager.on_fetch_ready(id).await,
                    JobEvent::Error => manager.on_fetch_ended_early(id, &job).await,
                }
            }
        });
    }

    async fn on_fetch_running(&self, id: DownloadId) {
        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(&id) else {
            return;
        };
        if record.status != Status::Queued {
            return;
        }
        record.status = Status::Downloading;
        drop(records);
        self.emit_event(Event::Downloading { id });
        tracing::debug!(download_id = %id, "fetch started");
    }

    /// Commit the staged file name together with the `ready` transition
    async fn on_fetch_ready(&self, id: DownloadId) {
        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(&id) else {
            return;
        };
        let staged = record.staged.lock().await.take();
        let Some(target_file) = staged else {
            // The unit of work returned Ok without staging anything; treat
            // it as a failed fetch rather than violating the invariant.
            record.status = Status::FetchError;
            drop(records);
            tracing::error!(download_id = %id, "fetch finished without a staged file");
            self.emit_event(Event::Failed {
                id,
                error: "fetch finished without a staged file".to_string(),
            });
            return;
        };
        record.status = Status::Ready;
        record.target_file = Some(target_file.clone());
        drop(records);
        self.emit_event(Event::Ready { id, target_file });
        tracing::info!(download_id = %id, "download ready for retrieval");
    }

    /// The fetch job ended in `error` or `aborted`
    async fn on_fetch_ended_early(&self, id: DownloadId, job: &Job) {
        let aborted = job.state() == JobState::Aborted;
        let error = job.error().unwrap_or_else(|| "fetch failed".to_string());
        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(&id) else {
            return;
        };
        let workdir = record.workdir.clone();
        if aborted {
            record.status = Status::Canceled;
            record.finished_at = Some(Utc::now());
        } else {
            record.status = Status::FetchError;
        }
        drop(records);
        // The unit of work already cleaned up on failure; this covers jobs
        // aborted before the work ever ran.
        Self::remove_workdir(&workdir).await;
        if aborted {
            self.emit_event(Event::Canceled { id });
            tracing::info!(download_id = %id, "download canceled");
        } else {
            tracing::warn!(download_id = %id, error = %error, "fetch failed");
            self.emit_event(Event::Failed { id, error });
        }
    }
}

/// Run the fetch pipeline: yt-dlp, then staging of what it produced
///
/// A single fetched file is renamed to `<id>.<ext>`; multiple files are
/// bundled into `<id>.tar` and the originals deleted right away to free
/// space. The staged name is parked in the hand-off slot for the status
/// observer to commit.
#[allow(clippy::too_many_arguments)]
async fn run_fetch(
    process: Arc<dyn ProcessHandle>,
    ytdlp: &Path,
    tar: &Path,
    id: DownloadId,
    request: &DownloadRequest,
    workdir: &Path,
    staged: &Mutex<Option<String>>,
    cancel: CancellationToken,
) -> Result<()> {
    tokio::fs::create_dir_all(workdir).await?;
    let plan = fetch::fetch_plan(ytdlp, workdir, request)?;
    process.run(&plan, &cancel).await?;

    let mut files = list_files(workdir).await?;
    files.sort();

    let staged_name = match files.len() {
        0 => return Err(Error::ExternalTool("fetch produced no files".to_string())),
        1 => {
            let name = fetch::staged_single_name(&id.dir_name(), &files[0]);
            tokio::fs::rename(workdir.join(&files[0]), workdir.join(&name)).await?;
            name
        }
        _ => {
            let name = fetch::staged_archive_name(&id.dir_name());
            let plan = fetch::archive_plan(tar, workdir, &name, &files);
            process.run(&plan, &cancel).await?;
            // clean the originals as soon as possible to free space
            for file in &files {
                tokio::fs::remove_file(workdir.join(file)).await?;
            }
            name
        }
    };

    *staged.lock().await = Some(staged_name);
    Ok(())
}

async fn list_files(workdir: &Path) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(workdir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        files.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(files)
}
