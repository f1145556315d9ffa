//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`downloads`] - Download management and file retrieval
//! - [`system`] - Health, events, OpenAPI

mod downloads;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use downloads::*;
pub use system::*;
