//! Application state for the API server

use crate::{Config, QueueService};
use std::sync::Arc;

/// Shared state handed to every route handler
///
/// Cloned per request; both fields are cheap handles.
#[derive(Clone)]
pub struct AppState {
    /// The download queue
    pub queue: QueueService,

    /// Configuration the server was started with
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(queue: QueueService, config: Arc<Config>) -> Self {
        Self { queue, config }
    }
}
