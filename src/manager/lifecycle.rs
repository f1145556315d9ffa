//! Startup and shutdown coordination

use super::DownloadManager;
use super::sweeper::RetentionSweeper;
use crate::types::Event;
use std::sync::atomic::Ordering;

impl DownloadManager {
    /// Start background processing
    ///
    /// Spawns the job scheduler's admission worker and the retention
    /// sweeper. Downloads admitted before `start()` stay queued until the
    /// scheduler is up.
    pub fn start(&self) {
        self.scheduler.start();
        tokio::spawn(RetentionSweeper::new(self.clone()).run());
        tracing::info!(
            storage_root = %self.config.storage.root.display(),
            "download manager started"
        );
    }

    /// Graceful shutdown
    ///
    /// Stops admitting downloads (callers get a shutting-down error), stops
    /// the scheduler from pulling queued jobs, and stops the sweeper.
    /// Already-running fetches are not force-killed; they finish or get
    /// individually canceled.
    pub async fn shutdown(&self) {
        tracing::info!("download manager shutting down");
        self.accepting_new.store(false, Ordering::SeqCst);
        self.scheduler.stop();
        self.shutdown_token.cancel();
        self.emit_event(Event::Shutdown);
    }
}
