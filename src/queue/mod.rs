//! Single-worker download queue split into focused submodules.
//!
//! The `QueueService` struct and its methods are organized by domain:
//! - [`store`] - Job list, log ring and loop flags under one lock
//! - [`broadcast`] - Throttled snapshot publishing
//! - [`control`] - add/cancel/remove/clear/state
//! - [`worker`] - The scheduling loop and backend fallback
//! - [`reporter`] - Per-job handle backends report through
//! - [`lifecycle`] - Shutdown coordination

mod broadcast;
mod control;
mod lifecycle;
mod reporter;
mod store;
mod worker;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use reporter::JobReporter;

use crate::backend::{self, RetrievalBackend};
use crate::config::Config;
use crate::error::Result;
use crate::types::{
    BackendCapability, Capabilities, Event, LogEntry, LogLevel, ModelDirectories,
};
use broadcast::Broadcaster;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use store::JobStore;

/// Buffer for the event channel; slower subscribers see `Lagged`
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// The two backends a job can be routed to
#[derive(Clone)]
pub(crate) struct Backends {
    /// Segment downloader, also the fallback for everything
    pub(crate) segment: Arc<dyn RetrievalBackend>,
    /// Repository transfer client, tried first for Hugging Face jobs
    pub(crate) repo: Arc<dyn RetrievalBackend>,
}

/// Download queue handle (cloneable - all fields are Arc-wrapped)
///
/// Jobs run one at a time in submission order on a background task started
/// by [`start`](Self::start). Control operations only take the store lock
/// briefly and never wait on a download.
#[derive(Clone)]
pub struct QueueService {
    pub(crate) store: Arc<tokio::sync::Mutex<JobStore>>,
    pub(crate) broadcaster: Arc<Broadcaster>,
    pub(crate) config: Arc<Config>,
    pub(crate) backends: Backends,
    pub(crate) worker: Arc<tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>>,
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl QueueService {
    /// Create a queue using the backends found on this host
    ///
    /// Missing binaries do not fail construction; jobs that need them end
    /// with `<tool> not installed`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use model_dl::{Config, JobRequest, QueueService};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let queue = QueueService::new(Config::default())?;
    ///
    ///     let mut events = queue.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             println!("{}: {:?}", event.topic(), event);
    ///         }
    ///     });
    ///
    ///     queue
    ///         .add(JobRequest::new(
    ///             "https://example.com/models/vae.safetensors",
    ///             "./models/vae",
    ///         ))
    ///         .await?;
    ///     queue.start().await?;
    ///     Ok(())
    /// }
    /// ```
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let segment = backend::discover_segment_backend(&config)?;
        let repo = backend::discover_repo_backend(&config);
        Self::with_backends(config, segment, repo)
    }

    /// Create a queue with caller-supplied backends
    pub fn with_backends(
        config: Config,
        segment: Arc<dyn RetrievalBackend>,
        repo: Arc<dyn RetrievalBackend>,
    ) -> Result<Self> {
        config.validate()?;

        let store = JobStore::new(config.queue.log_capacity);
        let broadcaster = Broadcaster::new(EVENT_CHANNEL_CAPACITY, config.queue.broadcast_interval);

        Ok(Self {
            store: Arc::new(tokio::sync::Mutex::new(store)),
            broadcaster: Arc::new(broadcaster),
            config: Arc::new(config),
            backends: Backends { segment, repo },
            worker: Arc::new(tokio::sync::Mutex::new(None)),
            accepting_new: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Subscribe to queue events
    ///
    /// Each subscriber receives every event independently. A subscriber
    /// that falls more than 1000 events behind gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.broadcaster.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Append a user-visible log entry and mirror it to `tracing`
    pub async fn log(&self, message: impl Into<String>, level: LogLevel) {
        let entry = LogEntry::now(message, level);
        match level {
            LogLevel::Info | LogLevel::Success => tracing::info!(?level, "{}", entry.message),
            LogLevel::Warning => tracing::warn!("{}", entry.message),
            LogLevel::Error => tracing::error!("{}", entry.message),
        }

        self.store.lock().await.push_log(entry.clone());
        self.broadcaster.send_log(entry);
    }

    /// Publish a snapshot, subject to the throttle unless `force`
    pub(crate) async fn publish_state(&self, force: bool) {
        if !self.broadcaster.should_publish(force) {
            return;
        }
        let snapshot = self
            .store
            .lock()
            .await
            .snapshot(self.config.queue.snapshot_log_count);
        self.broadcaster.send_snapshot(snapshot);
    }

    /// Model folders clients can target
    pub fn model_directories(&self) -> ModelDirectories {
        let base = self.config.download.models_root.clone();
        let directories = self
            .config
            .download
            .model_folders
            .iter()
            .map(|name| (name.clone(), base.join(name)))
            .collect();
        ModelDirectories { directories, base }
    }

    /// Probe both backends
    pub async fn capabilities(&self) -> Capabilities {
        let (segment, repo) = tokio::join!(
            describe(self.backends.segment.as_ref()),
            describe(self.backends.repo.as_ref())
        );
        Capabilities {
            segment_downloader: segment,
            repo_transfer_client: repo,
        }
    }
}

async fn describe(backend: &dyn RetrievalBackend) -> BackendCapability {
    BackendCapability {
        name: backend.name().to_string(),
        installed: backend.probe().await,
        binary: backend.binary().map(|p| p.to_path_buf()),
    }
}
