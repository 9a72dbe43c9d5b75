//! Queue processing: the single worker loop and backend fallback.

use crate::backend::{BackendOutcome, RetrievalBackend};
use crate::error::{Error, Result};
use crate::types::{Job, JobId, LogLevel, Platform, Provider, StartOutcome, Status};
use crate::utils::{format_bytes, format_duration};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;

use super::{JobReporter, QueueService};

impl QueueService {
    /// Start the worker loop
    ///
    /// Returns [`StartOutcome::AlreadyRunning`] without side effects if a
    /// loop is active, so concurrent calls never produce two loops.
    ///
    /// # Errors
    ///
    /// [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown).
    pub async fn start(&self) -> Result<StartOutcome> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let cancel = {
            let mut store = self.store.lock().await;
            if store.is_processing() {
                return Ok(StartOutcome::AlreadyRunning);
            }
            store.set_processing(true);
            store.reset_cancel()
        };

        tracing::info!("worker loop starting");
        self.log("Queue started", LogLevel::Info).await;
        self.publish_state(true).await;

        let service = self.clone();
        let handle = tokio::spawn(async move { service.run_queue(cancel).await });
        *self.worker.lock().await = Some(handle);

        Ok(StartOutcome::Started)
    }

    /// Claim and run queued jobs until none remain or `cancel` fires
    async fn run_queue(&self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                self.store.lock().await.set_processing(false);
                tracing::info!("worker loop stopped by cancellation");
                break;
            }

            // claim_next_queued clears the processing flag when it finds nothing
            let claimed = self.store.lock().await.claim_next_queued();
            let Some(job) = claimed else {
                tracing::info!("queue drained, worker loop exiting");
                self.log("Queue finished", LogLevel::Info).await;
                break;
            };

            tracing::info!(job_id = %job.id, url = %job.url, provider = job.provider.as_str(), "job started");
            self.publish_state(true).await;
            self.log(format!("Starting: {}", job.display_name()), LogLevel::Info)
                .await;

            let run = AssertUnwindSafe(self.process_job(&job, &cancel))
                .catch_unwind()
                .await;
            if let Err(panic) = run {
                self.store.lock().await.set_active_pid(None);
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "job processing panicked".to_string());
                tracing::error!(job_id = %job.id, error = %reason, "job processing panicked");
                self.settle(&job.id, Err(Error::Internal(reason)), &cancel)
                    .await;
            }

            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(self.config.queue.inter_job_delay) => {}
            }
        }

        self.publish_state(true).await;
    }

    /// Run one job through its backend(s) and record the result
    async fn process_job(&self, job: &Job, cancel: &CancellationToken) {
        let segment = Arc::clone(&self.backends.segment);

        let outcome = if job.provider == Provider::RepoTransferClient
            && job.platform == Platform::Huggingface
        {
            let repo = Arc::clone(&self.backends.repo);
            let first = self.attempt(repo.as_ref(), job, cancel).await;

            let wants_fallback = match &first {
                Ok(outcome) => outcome.wants_fallback(),
                Err(_) => true,
            };

            if wants_fallback && !cancel.is_cancelled() && self.is_still_downloading(&job.id).await
            {
                let reason = match &first {
                    Ok(BackendOutcome::Failed { error, .. }) => error.to_string(),
                    Err(e) => e.to_string(),
                    Ok(_) => String::new(),
                };
                tracing::warn!(job_id = %job.id, error = %reason, "repository transfer failed, falling back");
                self.log(
                    format!("{} failed ({reason}), falling back to aria2", repo.name()),
                    LogLevel::Warning,
                )
                .await;
                match self.switch_to_segment(job, "Retrying with aria2...").await {
                    Some(job) => self.attempt(segment.as_ref(), &job, cancel).await,
                    None => first,
                }
            } else {
                first
            }
        } else {
            let job = if job.provider == Provider::SegmentDownloader {
                Some(job.clone())
            } else {
                self.switch_to_segment(job, "Starting download...").await
            };
            match job {
                Some(job) => self.attempt(segment.as_ref(), &job, cancel).await,
                None => Ok(BackendOutcome::Cancelled),
            }
        };

        self.settle(&job.id, outcome, cancel).await;
    }

    /// Probe, then run, one backend for a job
    async fn attempt(
        &self,
        backend: &dyn RetrievalBackend,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<BackendOutcome> {
        if !backend.probe().await {
            tracing::warn!(job_id = %job.id, backend = backend.name(), "backend not installed");
            return Ok(BackendOutcome::retryable(Error::BackendNotInstalled(
                backend.name().to_string(),
            )));
        }

        tracing::debug!(job_id = %job.id, backend = backend.name(), "running backend");
        let reporter = JobReporter::new(self.clone(), job.id.clone());
        let result = backend.run(job, &reporter, cancel).await;
        // Early returns inside the backend can skip detach_process
        self.store.lock().await.set_active_pid(None);
        result
    }

    async fn is_still_downloading(&self, id: &JobId) -> bool {
        self.store
            .lock()
            .await
            .job(id)
            .is_some_and(|job| job.status == Status::Downloading)
    }

    /// Route a job to the segment downloader, resetting its progress
    ///
    /// Returns the updated job, or `None` if it is no longer downloading.
    async fn switch_to_segment(&self, job: &Job, message: &str) -> Option<Job> {
        let updated = {
            let mut store = self.store.lock().await;
            let applied = store.update_active(&job.id, |job| {
                job.provider = Provider::SegmentDownloader;
                job.progress = 0;
                job.speed.clear();
                job.eta.clear();
                job.message = message.to_string();
            });
            if applied { store.job(&job.id).cloned() } else { None }
        };
        if updated.is_some() {
            self.publish_state(true).await;
        }
        updated
    }

    /// Apply a backend result to the job
    ///
    /// Cancellation wins over whatever the backend reported. Jobs that were
    /// removed or already finished are left alone.
    async fn settle(
        &self,
        id: &JobId,
        outcome: Result<BackendOutcome>,
        cancel: &CancellationToken,
    ) {
        if cancel.is_cancelled() {
            let changed = self.store.lock().await.finish(
                id,
                Status::Cancelled,
                "Download cancelled",
                |_| {},
            );
            if changed {
                self.log("Download cancelled", LogLevel::Warning).await;
                self.publish_state(true).await;
            }
            return;
        }

        let (status, message, level, changed) = match outcome {
            Ok(BackendOutcome::Completed {
                path,
                size_bytes,
                duration,
            }) => {
                let message = format!(
                    "Completed! {} in {}",
                    format_bytes(size_bytes),
                    format_duration(duration)
                );
                let log = format!("Download complete: {}", path.display());
                let changed = self.store.lock().await.finish(
                    id,
                    Status::Completed,
                    message,
                    |job| {
                        job.progress = 100;
                        job.eta.clear();
                        job.output_path = Some(path);
                        job.size_bytes = Some(size_bytes);
                    },
                );
                (Status::Completed, log, LogLevel::Success, changed)
            }
            Ok(BackendOutcome::Failed { error, .. }) | Err(error) => {
                let message = error.to_string();
                let changed =
                    self.store
                        .lock()
                        .await
                        .finish(id, Status::Error, message.clone(), |_| {});
                (Status::Error, format!("Error: {message}"), LogLevel::Error, changed)
            }
            Ok(BackendOutcome::Cancelled) => {
                let changed = self.store.lock().await.finish(
                    id,
                    Status::Cancelled,
                    "Download cancelled",
                    |_| {},
                );
                (
                    Status::Cancelled,
                    "Download cancelled".to_string(),
                    LogLevel::Warning,
                    changed,
                )
            }
        };

        if !changed {
            tracing::debug!(job_id = %id, ?status, "job removed or already terminal, result dropped");
            return;
        }

        tracing::info!(job_id = %id, ?status, "job finished");
        self.log(message, level).await;
        self.publish_state(true).await;
    }
}
