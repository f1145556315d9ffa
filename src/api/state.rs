//! Application state for the API server

use crate::{Config, DownloadManager};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned per request (cheap, the manager is Arc-backed internally).
#[derive(Clone)]
pub struct AppState {
    /// The download manager instance
    pub manager: DownloadManager,

    /// Configuration (read access)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(manager: DownloadManager, config: Arc<Config>) -> Self {
        Self { manager, config }
    }
}
