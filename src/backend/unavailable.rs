//! Stand-in backend used when a binary cannot be found

use super::traits::{BackendOutcome, RetrievalBackend};
use crate::error::Error;
use crate::queue::JobReporter;
use crate::types::Job;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Backend whose tool is not installed
///
/// Probes as not installed and fails every run, so the queue reports
/// `<name> not installed` for affected jobs instead of refusing to start.
#[derive(Debug, Clone, Copy)]
pub struct UnavailableBackend {
    name: &'static str,
}

impl UnavailableBackend {
    /// Create a stand-in reporting `name` as missing
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl RetrievalBackend for UnavailableBackend {
    async fn probe(&self) -> bool {
        false
    }

    async fn run(
        &self,
        _job: &Job,
        _reporter: &JobReporter,
        _cancel: &CancellationToken,
    ) -> crate::Result<BackendOutcome> {
        Ok(BackendOutcome::retryable(Error::BackendNotInstalled(
            self.name.to_string(),
        )))
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
