//! Control surface: add, cancel, remove, clear, state.

use crate::error::{Error, Result};
use crate::types::{CancelOutcome, JobId, JobRequest, LogLevel, QueueSnapshot, Status};
use std::sync::atomic::Ordering;

use super::QueueService;

impl QueueService {
    /// Queue a download
    ///
    /// `url` and `directory` must be non-empty after trimming. The platform is
    /// derived from the URL; without an explicit provider, Hugging Face URLs
    /// go to the repository transfer client and everything else to the
    /// segment downloader.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingField`] for an empty url or directory
    /// - [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown)
    pub async fn add(&self, request: JobRequest) -> Result<JobId> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let url = request.url.trim().to_string();
        if url.is_empty() {
            return Err(Error::MissingField("url".to_string()));
        }
        let directory = request.directory.to_string_lossy().trim().to_string();
        if directory.is_empty() {
            return Err(Error::MissingField("directory".to_string()));
        }
        let filename = request
            .filename
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let request = JobRequest {
            url,
            directory: directory.into(),
            filename,
            provider: request.provider,
        };

        let (id, name) = {
            let mut store = self.store.lock().await;
            let id = store.push(request);
            let name = store
                .job(&id)
                .map(|job| job.display_name().to_string())
                .unwrap_or_default();
            (id, name)
        };

        tracing::info!(job_id = %id, "job queued");
        self.log(format!("Added to queue: {name}"), LogLevel::Info)
            .await;
        self.publish_state(true).await;
        Ok(id)
    }

    /// Stop the active job and the worker loop
    ///
    /// Cancels the loop's token, marks the downloading job `cancelled` and
    /// sends its subprocess a terminate signal. Queued jobs stay queued so
    /// `start()` can resume them. With nothing running only a log entry is
    /// added.
    pub async fn cancel(&self) -> CancelOutcome {
        let (cancelled, pid, was_processing) = {
            let mut store = self.store.lock().await;
            let was_processing = store.is_processing();
            if was_processing {
                store.cancel_token().cancel();
            }
            let cancelled = store.active_job_id().and_then(|id| {
                store
                    .finish(&id, Status::Cancelled, "Download cancelled", |_| {})
                    .then_some(id)
            });
            let pid = if was_processing { store.active_pid() } else { None };
            (cancelled, pid, was_processing)
        };

        if let Some(pid) = pid {
            let signalled = crate::utils::terminate_process(pid);
            tracing::debug!(pid, signalled, "sent terminate to active subprocess");
        }

        match cancelled {
            Some(id) => {
                tracing::info!(job_id = %id, "job cancelled");
                self.log("Download cancelled by user", LogLevel::Warning)
                    .await;
                self.publish_state(true).await;
            }
            None if was_processing => {
                self.log("Queue stopped", LogLevel::Warning).await;
            }
            None => {
                self.log("Nothing to cancel", LogLevel::Info).await;
            }
        }

        CancelOutcome::Cancelled
    }

    /// Remove a job from the list
    ///
    /// Removing the downloading job does not stop its backend; the worker
    /// finds the job gone when the run ends and discards the result.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no job has this id.
    pub async fn remove(&self, id: &JobId) -> Result<()> {
        let removed = self.store.lock().await.remove(id);
        let Some(job) = removed else {
            return Err(Error::NotFound(id.to_string()));
        };

        if job.status == Status::Downloading {
            tracing::warn!(job_id = %id, "removed job is still downloading");
        }
        self.log(format!("Removed: {}", job.display_name()), LogLevel::Info)
            .await;
        self.publish_state(true).await;
        Ok(())
    }

    /// Remove every completed, failed and cancelled job
    ///
    /// Returns the number of jobs removed.
    pub async fn clear(&self) -> usize {
        let removed = self.store.lock().await.clear_terminal();
        if removed > 0 {
            self.log(format!("Cleared {removed} finished jobs"), LogLevel::Info)
                .await;
        }
        self.publish_state(true).await;
        removed
    }

    /// Empty the log buffer
    pub async fn clear_logs(&self) {
        self.store.lock().await.clear_logs();
        self.publish_state(true).await;
    }

    /// Current jobs, loop flag and recent logs
    pub async fn state(&self) -> QueueSnapshot {
        self.store
            .lock()
            .await
            .snapshot(self.config.queue.snapshot_log_count)
    }

    /// Whether the worker loop is running
    pub async fn is_processing(&self) -> bool {
        self.store.lock().await.is_processing()
    }
}
