//! Handle through which a running backend updates its job

use super::QueueService;
use crate::progress::ProgressUpdate;
use crate::types::{JobId, LogLevel};

/// Per-job view of the queue given to a backend for the length of one run
///
/// Updates only land while the job is still `downloading`; once it is
/// terminal (e.g. cancelled) or removed they are dropped silently.
#[derive(Clone)]
pub struct JobReporter {
    service: QueueService,
    id: JobId,
}

impl JobReporter {
    pub(crate) fn new(service: QueueService, id: JobId) -> Self {
        Self { service, id }
    }

    /// Job this reporter belongs to
    pub fn job_id(&self) -> &JobId {
        &self.id
    }

    /// Merge parsed progress into the job; absent fields keep their value
    pub async fn progress(&self, update: ProgressUpdate) {
        if update.is_empty() {
            return;
        }
        let applied = self
            .service
            .store
            .lock()
            .await
            .update_active(&self.id, |job| {
                if let Some(percent) = update.percent {
                    job.progress = percent.min(100);
                }
                if let Some(speed) = update.speed {
                    job.speed = speed;
                }
                if let Some(eta) = update.eta {
                    job.eta = eta;
                }
            });
        if applied {
            self.service.publish_state(false).await;
        }
    }

    /// Record the filename the backend is writing to
    pub async fn detected_filename(&self, name: &str) {
        let applied = self
            .service
            .store
            .lock()
            .await
            .update_active(&self.id, |job| job.detected_filename = name.to_string());
        if applied {
            self.service.publish_state(false).await;
        }
    }

    /// Replace the job's status message
    pub async fn message(&self, message: impl Into<String>) {
        let message = message.into();
        let applied = self
            .service
            .store
            .lock()
            .await
            .update_active(&self.id, |job| job.message = message);
        if applied {
            self.service.publish_state(false).await;
        }
    }

    /// Append a queue log entry
    pub async fn log(&self, message: impl Into<String>, level: LogLevel) {
        self.service.log(message, level).await;
    }

    /// Register the backend subprocess so `cancel()` can signal it
    pub async fn attach_process(&self, pid: u32) {
        self.service.store.lock().await.set_active_pid(Some(pid));
    }

    /// Forget the backend subprocess
    pub async fn detach_process(&self) {
        self.service.store.lock().await.set_active_pid(None);
    }
}
