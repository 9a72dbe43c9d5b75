//! # model-dl
//!
//! Single-worker download queue for AI model files.
//!
//! Jobs are processed one at a time in submission order. Hugging Face URLs
//! go to the repository transfer client (`hf`) first and fall back to the
//! segmented downloader (`aria2c`); everything else goes straight to
//! `aria2c`. Observers subscribe to queue snapshots and log entries instead
//! of polling.
//!
//! ## Quick Start
//!
//! ```no_run
//! use model_dl::{Config, JobRequest, QueueService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let queue = QueueService::new(Config::default())?;
//!
//!     let mut events = queue.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{}: {:?}", event.topic(), event);
//!         }
//!     });
//!
//!     queue
//!         .add(JobRequest::new(
//!             "https://huggingface.co/black-forest-labs/FLUX.1-dev/resolve/main/ae.safetensors",
//!             "./models/vae",
//!         ))
//!         .await?;
//!     queue.start().await?;
//!
//!     model_dl::run_with_shutdown(queue).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Download backends (aria2c, Hugging Face CLI)
pub mod backend;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Output filename resolution
pub mod filename;
/// Progress line parsing
pub mod progress;
/// The download queue (decomposed into focused submodules)
pub mod queue;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use backend::{BackendOutcome, RetrievalBackend};
pub use config::Config;
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use progress::ProgressUpdate;
pub use queue::{JobReporter, QueueService};
pub use types::{
    CancelOutcome, Capabilities, Event, Job, JobId, JobRequest, LogEntry, LogLevel, Platform,
    Provider, QueueSnapshot, StartOutcome, Status,
};

/// Run until a termination signal arrives, then shut the queue down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use model_dl::{Config, QueueService, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let queue = QueueService::new(Config::default())?;
///     run_with_shutdown(queue).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(queue: QueueService) -> Result<()> {
    wait_for_signal().await;
    queue.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
