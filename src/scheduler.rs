//! Job admission and execution
//!
//! The [`JobScheduler`] is the single authority that moves a job from
//! `queued` to `running`. Admitted jobs flow through an unbounded channel
//! to a worker task which spawns each unit of work as its own tokio task;
//! one job's failure can never crash another job or the worker itself.
//!
//! The domain defines no concurrency bound, so by default every admitted
//! job runs immediately. An optional cap can be configured, in which case
//! a semaphore delays the `queued → running` transition until a permit is
//! available.

use crate::error::{Error, Result};
use crate::job::{Job, JobState};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

/// Runs admitted jobs and owns their `queued → running` transition
pub struct JobScheduler {
    queue_tx: mpsc::UnboundedSender<Arc<Job>>,
    queue_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<Arc<Job>>>>,
    accepting: AtomicBool,
    shutdown: CancellationToken,
    concurrency: Option<Arc<Semaphore>>,
}

impl JobScheduler {
    /// Create a scheduler with an optional concurrency cap
    pub fn new(max_concurrent: Option<usize>) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            queue_tx,
            queue_rx: std::sync::Mutex::new(Some(queue_rx)),
            accepting: AtomicBool::new(true),
            shutdown: CancellationToken::new(),
            concurrency: max_concurrent.map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    /// Start the admission worker
    ///
    /// Idempotent: calling this a second time logs a warning and does
    /// nothing. Jobs admitted before `start()` stay queued and run once
    /// the worker is up.
    pub fn start(&self) {
        let receiver = {
            let mut slot = match self.queue_rx.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            slot.take()
        };
        let Some(mut queue_rx) = receiver else {
            tracing::warn!("job scheduler already started");
            return;
        };

        let shutdown = self.shutdown.clone();
        let concurrency = self.concurrency.clone();
        tokio::spawn(async move {
            tracing::info!("job scheduler started");
            loop {
                let job = tokio::select! {
                    job = queue_rx.recv() => {
                        let Some(job) = job else { break };
                        job
                    }
                    _ = shutdown.cancelled() => break,
                };

                let permit = match &concurrency {
                    Some(semaphore) => {
                        tokio::select! {
                            permit = semaphore.clone().acquire_owned() => {
                                match permit {
                                    Ok(permit) => Some(permit),
                                    // semaphore closed; cannot happen, but bail cleanly
                                    Err(_) => break,
                                }
                            }
                            _ = shutdown.cancelled() => break,
                        }
                    }
                    None => None,
                };

                tokio::spawn(async move {
                    execute(job).await;
                    drop(permit);
                });
            }
            tracing::info!("job scheduler stopped");
        });
    }

    /// Admit a job: `new → queued`, then schedule it for execution
    ///
    /// Rejected with [`Error::ShuttingDown`] after [`JobScheduler::stop`].
    pub fn run(&self, job: Arc<Job>) -> Result<()> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        job.mark_queued()?;
        self.queue_tx
            .send(job)
            .map_err(|_| Error::ShuttingDown)?;
        Ok(())
    }

    /// Stop pulling queued jobs
    ///
    /// Already-running units of work are not force-killed; they finish on
    /// their own (or via their job's `abort`).
    pub fn stop(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
    }
}

/// Run one job to completion, capturing any failure
///
/// Failures are recorded on the job and logged; they never propagate
/// across the job boundary.
async fn execute(job: Arc<Job>) {
    // Canceled while queued: nothing to do, the work never runs.
    if job.state() == JobState::Canceled {
        return;
    }
    // Aborted while queued: end the job without starting its side effects.
    if job.cancellation_requested() {
        job.finish_aborted_before_run();
        return;
    }
    if !job.mark_running() {
        return;
    }
    let Some(work) = job.take_work() else {
        tracing::error!(operation = %job.identity().operation, "job has no unit of work");
        job.finish(Err(Error::Other("job has no unit of work".to_string())));
        return;
    };

    // Each execution gets a fresh child token tied to this job's abort.
    let result = work(job.cancel_token().child_token()).await;
    if let Err(e) = &result {
        tracing::warn!(
            operation = %job.identity().operation,
            subjects = ?job.identity().subjects,
            error = %e,
            "job finished with error"
        );
    }
    job.finish(result);
}
