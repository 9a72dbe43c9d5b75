//! Traits and types for retrieval backends

use crate::error::Error;
use crate::queue::JobReporter;
use crate::types::Job;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a backend run ended
#[must_use]
#[derive(Debug)]
pub enum BackendOutcome {
    /// The output file exists
    Completed {
        /// Final artifact path
        path: PathBuf,
        /// Size on disk
        size_bytes: u64,
        /// Wall-clock time of the run
        duration: Duration,
    },
    /// The run produced no output
    Failed {
        /// Cause, shown as the job message
        error: Error,
        /// Whether another backend may be tried for the same job
        should_fallback: bool,
    },
    /// The run was stopped by cancellation
    Cancelled,
}

impl BackendOutcome {
    /// Failure that must not be retried elsewhere
    pub fn fatal(error: Error) -> Self {
        Self::Failed {
            error,
            should_fallback: false,
        }
    }

    /// Failure after which the other backend may be tried
    pub fn retryable(error: Error) -> Self {
        Self::Failed {
            error,
            should_fallback: true,
        }
    }

    /// Whether the scheduler should move on to the fallback backend
    pub fn wants_fallback(&self) -> bool {
        matches!(
            self,
            BackendOutcome::Failed {
                should_fallback: true,
                ..
            }
        )
    }
}

/// A way of retrieving one job's file
///
/// Implementations report the detected filename and progress through the
/// [`JobReporter`], watch `cancel` after every unit of output, and never
/// return `Err` for conditions they can classify as a [`BackendOutcome`].
///
/// # Examples
///
/// ```no_run
/// use model_dl::backend::{Aria2Backend, RetrievalBackend};
/// use model_dl::Config;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = Aria2Backend::from_path(&Config::default())?
///     .expect("aria2c not found in PATH");
/// println!("{} installed: {}", backend.name(), backend.probe().await);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    /// Check that the backend can run, typically by invoking `--version`
    async fn probe(&self) -> bool;

    /// Retrieve `job` into its directory
    async fn run(
        &self,
        job: &Job,
        reporter: &JobReporter,
        cancel: &CancellationToken,
    ) -> crate::Result<BackendOutcome>;

    /// Short name used in logs and the not-installed error
    fn name(&self) -> &'static str;

    /// Executable this backend invokes, if any
    fn binary(&self) -> Option<&Path> {
        None
    }
}
