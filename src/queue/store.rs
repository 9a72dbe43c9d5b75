//! Job list, log ring and loop flags, guarded together by one mutex

use crate::types::{Job, JobId, JobRequest, LogEntry, QueueSnapshot, Status};
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;

/// Everything the control surface and the worker mutate
///
/// Owned by [`QueueService`](super::QueueService) behind a
/// `tokio::sync::Mutex`; no method here blocks or awaits.
pub(crate) struct JobStore {
    jobs: Vec<Job>,
    logs: VecDeque<LogEntry>,
    log_capacity: usize,
    processing: bool,
    cancel: CancellationToken,
    active_pid: Option<u32>,
    next_seq: u64,
}

impl JobStore {
    pub(crate) fn new(log_capacity: usize) -> Self {
        Self {
            jobs: Vec::new(),
            logs: VecDeque::with_capacity(log_capacity),
            log_capacity,
            processing: false,
            cancel: CancellationToken::new(),
            active_pid: None,
            next_seq: 0,
        }
    }

    /// Append a queued job and return its id
    pub(crate) fn push(&mut self, request: JobRequest) -> JobId {
        self.next_seq += 1;
        let id = JobId::generate(chrono::Utc::now().timestamp_millis(), self.next_seq);
        self.jobs.push(Job::new(id.clone(), request));
        id
    }

    pub(crate) fn job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| &job.id == id)
    }

    /// Mark the oldest queued job as downloading and return a copy
    ///
    /// When nothing is queued the processing flag is cleared in the same
    /// critical section, so a concurrent `add` either gets claimed by this
    /// loop or sees the loop stopped and can start a new one.
    pub(crate) fn claim_next_queued(&mut self) -> Option<Job> {
        let Some(job) = self.jobs.iter_mut().find(|job| job.status == Status::Queued) else {
            self.processing = false;
            return None;
        };

        job.status = Status::Downloading;
        job.progress = 0;
        job.speed.clear();
        job.eta.clear();
        job.message = "Starting download...".to_string();
        Some(job.clone())
    }

    /// The job currently downloading, if any
    pub(crate) fn active_job_id(&self) -> Option<JobId> {
        self.jobs
            .iter()
            .find(|job| job.status == Status::Downloading)
            .map(|job| job.id.clone())
    }

    /// Apply `f` to a job that is still downloading
    ///
    /// Returns false (and leaves the job alone) if the job is gone or
    /// already terminal.
    pub(crate) fn update_active(&mut self, id: &JobId, f: impl FnOnce(&mut Job)) -> bool {
        match self.jobs.iter_mut().find(|job| &job.id == id) {
            Some(job) if job.status == Status::Downloading => {
                f(job);
                true
            }
            _ => false,
        }
    }

    /// Move a job to a terminal status
    ///
    /// Terminal jobs are never touched again, so this is a no-op returning
    /// false for missing or already-finished jobs.
    pub(crate) fn finish(
        &mut self,
        id: &JobId,
        status: Status,
        message: impl Into<String>,
        f: impl FnOnce(&mut Job),
    ) -> bool {
        debug_assert!(status.is_terminal());
        match self.jobs.iter_mut().find(|job| &job.id == id) {
            Some(job) if !job.status.is_terminal() => {
                job.status = status;
                job.message = message.into();
                f(job);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn remove(&mut self, id: &JobId) -> Option<Job> {
        let index = self.jobs.iter().position(|job| &job.id == id)?;
        Some(self.jobs.remove(index))
    }

    /// Drop completed, failed and cancelled jobs; returns how many went
    pub(crate) fn clear_terminal(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|job| !job.status.is_terminal());
        before - self.jobs.len()
    }

    pub(crate) fn push_log(&mut self, entry: LogEntry) {
        while self.logs.len() >= self.log_capacity {
            self.logs.pop_front();
        }
        self.logs.push_back(entry);
    }

    pub(crate) fn clear_logs(&mut self) {
        self.logs.clear();
    }

    pub(crate) fn log_count(&self) -> usize {
        self.logs.len()
    }

    pub(crate) fn is_processing(&self) -> bool {
        self.processing
    }

    pub(crate) fn set_processing(&mut self, processing: bool) {
        self.processing = processing;
    }

    /// Install a fresh token for a new worker loop
    pub(crate) fn reset_cancel(&mut self) -> CancellationToken {
        self.cancel = CancellationToken::new();
        self.cancel.clone()
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn set_active_pid(&mut self, pid: Option<u32>) {
        self.active_pid = pid;
    }

    pub(crate) fn active_pid(&self) -> Option<u32> {
        self.active_pid
    }

    /// Copy of the jobs plus the newest `log_count` log entries
    pub(crate) fn snapshot(&self, log_count: usize) -> QueueSnapshot {
        let skip = self.logs.len().saturating_sub(log_count);
        QueueSnapshot {
            jobs: self.jobs.clone(),
            is_processing: self.processing,
            recent_logs: self.logs.iter().skip(skip).cloned().collect(),
        }
    }
}
