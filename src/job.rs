//! Cancelable, observable unit of asynchronous work
//!
//! A [`Job`] wraps one unit of work with an identity and a fixed state
//! machine:
//!
//! ```text
//! new ──▶ queued ──▶ running ──▶ {done | error | aborted}
//!   │        │
//!   └────────┴──▶ canceled        (before execution only)
//! ```
//!
//! Transitions are monotonic; there is no way out of a terminal state.
//! Entering `running`, `done` and `error` each emit a one-shot
//! [`JobEvent`] to every observer (an `error` event is also emitted when
//! the job ends `aborted`; observers distinguish the two by reading the
//! final state). Observers must subscribe before the job is handed to the
//! scheduler so no transition can be missed.
//!
//! Cancellation is cooperative: [`Job::abort`] only sets the job's
//! cancellation token. The unit of work is expected to observe the token
//! at its suspension points and return promptly; it is never preempted.

use crate::error::{Error, JobError, Result};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The function a job executes, receiving its cancellation signal
pub type UnitOfWork =
    Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<()>> + Send + 'static>;

/// Job lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    /// Created, not yet admitted by the scheduler
    New,
    /// Admitted, waiting for execution
    Queued,
    /// The unit of work is executing
    Running,
    /// The unit of work finished successfully
    Done,
    /// The unit of work failed
    Error,
    /// The unit of work was stopped by a cooperative abort
    Aborted,
    /// Canceled before execution started
    Canceled,
}

impl JobState {
    /// Whether this state permits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Done | JobState::Error | JobState::Aborted | JobState::Canceled
        )
    }
}

/// One-shot lifecycle transition event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobEvent {
    /// The job entered `running`
    Running,
    /// The job entered `done`
    Done,
    /// The job entered `error` or `aborted`; read [`Job::state`] to tell
    Error,
}

/// Opaque job identity used for correlation and logging
///
/// The core does not enforce uniqueness on identities; they exist so log
/// lines and errors can be tied back to a subject.
#[derive(Clone, Debug)]
pub struct JobIdentity {
    /// Operation name, e.g. "media-fetch"
    pub operation: String,
    /// Key/value subject attributes, e.g. `download_id`
    pub subjects: HashMap<String, String>,
}

impl JobIdentity {
    /// Create an identity for the given operation
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            subjects: HashMap::new(),
        }
    }

    /// Attach a subject attribute
    pub fn subject(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.subjects.insert(key.into(), value.into());
        self
    }
}

struct JobInner {
    state: JobState,
    reason: Option<String>,
    error: Option<String>,
    work: Option<UnitOfWork>,
    observers: Vec<mpsc::UnboundedSender<JobEvent>>,
}

/// A cancelable, observable unit of asynchronous work
pub struct Job {
    identity: JobIdentity,
    cancel_token: CancellationToken,
    inner: Mutex<JobInner>,
}

impl Job {
    /// Create a new job in state `new`
    pub fn new(identity: JobIdentity, work: UnitOfWork) -> Self {
        Self {
            identity,
            cancel_token: CancellationToken::new(),
            inner: Mutex::new(JobInner {
                state: JobState::New,
                reason: None,
                error: None,
                work: Some(work),
                observers: Vec::new(),
            }),
        }
    }

    /// The job's identity
    pub fn identity(&self) -> &JobIdentity {
        &self.identity
    }

    /// Current lifecycle state
    pub fn state(&self) -> JobState {
        self.lock().state
    }

    /// The unit-of-work error message, once the job ended in `error` or
    /// `aborted`
    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// The reason given to `cancel` or `abort`, if any
    pub fn reason(&self) -> Option<String> {
        self.lock().reason.clone()
    }

    /// Whether cooperative cancellation has been requested
    pub fn cancellation_requested(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Subscribe to lifecycle transition events
    ///
    /// Events are delivered in transition order, at most once each. Call
    /// this before handing the job to the scheduler; a subscription made
    /// after execution started may miss the `running` event.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<JobEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().observers.push(tx);
        rx
    }

    /// Cancel the job before execution starts
    ///
    /// Valid only while the state is `new` or `queued`; transitions to
    /// `canceled` and prevents the unit of work from ever running.
    /// Idempotent on an already-canceled job. Returns
    /// [`JobError::AlreadyStarted`] once execution has begun.
    pub fn cancel(&self, reason: &str) -> Result<()> {
        let mut inner = self.lock();
        match inner.state {
            JobState::New | JobState::Queued => {
                inner.state = JobState::Canceled;
                inner.reason = Some(reason.to_string());
                inner.work = None;
                // Close observer channels so handler tasks terminate.
                inner.observers.clear();
                self.cancel_token.cancel();
                tracing::debug!(operation = %self.identity.operation, reason, "job canceled");
                Ok(())
            }
            JobState::Canceled => Ok(()),
            _ => Err(Error::Job(JobError::AlreadyStarted)),
        }
    }

    /// Request cooperative cancellation of an admitted or running job
    ///
    /// Sets the job's cancellation token; the in-flight unit of work is
    /// expected to observe it and stop. The job transitions to `aborted`
    /// only once the unit of work has actually returned. No-op on a
    /// terminal job.
    pub fn abort(&self, reason: &str) {
        let mut inner = self.lock();
        match inner.state {
            JobState::Queued | JobState::Running => {
                if inner.reason.is_none() {
                    inner.reason = Some(reason.to_string());
                }
                drop(inner);
                self.cancel_token.cancel();
                tracing::debug!(operation = %self.identity.operation, reason, "job abort requested");
            }
            _ => {}
        }
    }

    /// Clone of the job's cancellation token
    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Admit the job: `new → queued`. Scheduler-only.
    pub(crate) fn mark_queued(&self) -> Result<()> {
        let mut inner = self.lock();
        match inner.state {
            JobState::New => {
                inner.state = JobState::Queued;
                Ok(())
            }
            from => Err(Error::Job(JobError::InvalidTransition {
                from,
                to: JobState::Queued,
            })),
        }
    }

    /// Begin execution: `queued → running`, emitting [`JobEvent::Running`].
    ///
    /// Returns false if the job is no longer `queued` (canceled in the
    /// meantime), in which case the unit of work must not run.
    pub(crate) fn mark_running(&self) -> bool {
        let mut inner = self.lock();
        if inner.state != JobState::Queued {
            return false;
        }
        inner.state = JobState::Running;
        Self::emit(&mut inner, JobEvent::Running);
        true
    }

    /// Take the unit of work for execution. Scheduler-only, at most once.
    pub(crate) fn take_work(&self) -> Option<UnitOfWork> {
        self.lock().work.take()
    }

    /// Record the unit of work's outcome and enter a terminal state
    ///
    /// `Ok` ends the job `done`; `Err` ends it `aborted` when cancellation
    /// was requested, otherwise `error`. Emits the matching one-shot event
    /// and closes all observer channels.
    pub(crate) fn finish(&self, result: Result<()>) {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return;
        }
        match result {
            Ok(()) => {
                inner.state = JobState::Done;
                Self::emit(&mut inner, JobEvent::Done);
            }
            Err(e) => {
                inner.state = if self.cancel_token.is_cancelled() {
                    JobState::Aborted
                } else {
                    JobState::Error
                };
                inner.error = Some(e.to_string());
                Self::emit(&mut inner, JobEvent::Error);
            }
        }
        // Terminal: close observer channels so handler tasks can end.
        // Buffered events stay readable after the senders drop.
        inner.observers.clear();
    }

    /// End a queued job as `aborted` without running the unit of work
    ///
    /// Used when abort was requested while the job was still waiting; the
    /// unit of work never starts its side effects.
    pub(crate) fn finish_aborted_before_run(&self) {
        let mut inner = self.lock();
        if inner.state != JobState::Queued {
            return;
        }
        inner.state = JobState::Aborted;
        inner.work = None;
        Self::emit(&mut inner, JobEvent::Error);
        inner.observers.clear();
    }

    fn emit(inner: &mut JobInner, event: JobEvent) {
        for observer in &inner.observers {
            // send() fails only when the receiver is gone, which is fine
            observer.send(event).ok();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JobInner> {
        // A poisoned lock means a panic while mutating job state; the state
        // machine only assigns whole values, so the data is still coherent.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("identity", &self.identity)
            .field("state", &self.state())
            .finish()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn noop_job() -> Job {
        Job::new(
            JobIdentity::new("test").subject("case", "noop"),
            Box::new(|_cancel| Box::pin(async { Ok(()) })),
        )
    }

    #[test]
    fn test_new_job_starts_in_new() {
        let job = noop_job();
        assert_eq!(job.state(), JobState::New);
        assert!(!job.cancellation_requested());
    }

    #[test]
    fn test_cancel_from_new_and_queued() {
        let job = noop_job();
        job.cancel("changed my mind").unwrap();
        assert_eq!(job.state(), JobState::Canceled);
        assert_eq!(job.reason().as_deref(), Some("changed my mind"));

        let job = noop_job();
        job.mark_queued().unwrap();
        job.cancel("too late to want it").unwrap();
        assert_eq!(job.state(), JobState::Canceled);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let job = noop_job();
        job.cancel("first").unwrap();
        job.cancel("second").unwrap();
        assert_eq!(job.state(), JobState::Canceled);
        // the first reason wins
        assert_eq!(job.reason().as_deref(), Some("first"));
    }

    #[test]
    fn test_cancel_rejected_after_running() {
        let job = noop_job();
        job.mark_queued().unwrap();
        assert!(job.mark_running());

        let result = job.cancel("too late");
        assert!(matches!(
            result,
            Err(Error::Job(JobError::AlreadyStarted))
        ));
        assert_eq!(job.state(), JobState::Running);
    }

    #[test]
    fn test_abort_is_noop_on_terminal_job() {
        let job = noop_job();
        job.mark_queued().unwrap();
        job.mark_running();
        job.finish(Ok(()));
        assert_eq!(job.state(), JobState::Done);

        job.abort("late abort");
        assert_eq!(job.state(), JobState::Done);
        assert!(job.reason().is_none());
    }

    #[test]
    fn test_abort_sets_token_but_not_state() {
        let job = noop_job();
        job.mark_queued().unwrap();
        job.abort("stop");
        // abort is cooperative: the state only changes once the work stops
        assert_eq!(job.state(), JobState::Queued);
        assert!(job.cancellation_requested());
    }

    #[test]
    fn test_finish_err_after_abort_is_aborted() {
        let job = noop_job();
        job.mark_queued().unwrap();
        job.mark_running();
        job.abort("stop");
        job.finish(Err(Error::Canceled));
        assert_eq!(job.state(), JobState::Aborted);
    }

    #[test]
    fn test_finish_err_without_abort_is_error() {
        let job = noop_job();
        job.mark_queued().unwrap();
        job.mark_running();
        job.finish(Err(Error::ExternalTool("boom".to_string())));
        assert_eq!(job.state(), JobState::Error);
        assert_eq!(job.error().as_deref(), Some("external tool error: boom"));
    }

    #[test]
    fn test_no_transition_out_of_terminal() {
        let job = noop_job();
        job.mark_queued().unwrap();
        job.mark_running();
        job.finish(Err(Error::ExternalTool("boom".to_string())));
        assert_eq!(job.state(), JobState::Error);

        job.finish(Ok(()));
        assert_eq!(job.state(), JobState::Error);
        assert!(!job.mark_running());
    }

    #[test]
    fn test_mark_queued_requires_new() {
        let job = noop_job();
        job.mark_queued().unwrap();
        assert!(matches!(
            job.mark_queued(),
            Err(Error::Job(JobError::InvalidTransition { .. }))
        ));
    }

    #[tokio::test]
    async fn test_events_delivered_in_order_at_most_once() {
        let job = noop_job();
        let mut events = job.subscribe();

        job.mark_queued().unwrap();
        job.mark_running();
        job.finish(Ok(()));

        assert_eq!(events.recv().await, Some(JobEvent::Running));
        assert_eq!(events.recv().await, Some(JobEvent::Done));
        // channel closed after the terminal event
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test]
    async fn test_error_event_for_aborted_job() {
        let job = noop_job();
        let mut events = job.subscribe();

        job.mark_queued().unwrap();
        job.abort("stop");
        job.finish_aborted_before_run();

        assert_eq!(events.recv().await, Some(JobEvent::Error));
        assert_eq!(events.recv().await, None);
        assert_eq!(job.state(), JobState::Aborted);
    }

    #[tokio::test]
    async fn test_cancel_closes_observer_channel_without_events() {
        let job = noop_job();
        let mut events = job.subscribe();
        job.cancel("never mind").unwrap();
        // canceled jobs emit nothing; the channel just closes
        assert_eq!(events.recv().await, None);
    }

    #[test]
    fn test_take_work_is_single_shot() {
        let job = noop_job();
        assert!(job.take_work().is_some());
        assert!(job.take_work().is_none());
    }
}
