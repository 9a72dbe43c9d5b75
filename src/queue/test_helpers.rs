//! Shared helpers for queue tests: scripted backends and polling.

use crate::backend::{BackendOutcome, RetrievalBackend};
use crate::config::Config;
use crate::error::Error;
use crate::progress::ProgressUpdate;
use crate::queue::{JobReporter, QueueService};
use crate::types::{Job, JobId, QueueSnapshot};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

/// What a scripted backend does when run
#[derive(Clone, Debug)]
pub(crate) enum Script {
    /// Write a small file and succeed
    Complete,
    /// Report failure
    Fail { should_fallback: bool },
    /// Return `Err`
    Error,
    /// Block until cancelled
    WaitForCancel,
    /// Panic inside the run
    Panic,
}

/// In-process backend following a fixed script
pub(crate) struct ScriptedBackend {
    name: &'static str,
    installed: bool,
    script: Script,
    delay: Duration,
    progress: Vec<ProgressUpdate>,
    pid: Option<u32>,
    pub(crate) calls: Arc<Mutex<Vec<JobId>>>,
}

impl ScriptedBackend {
    pub(crate) fn new(name: &'static str, script: Script) -> Self {
        Self {
            name,
            installed: true,
            script,
            delay: Duration::ZERO,
            progress: Vec::new(),
            pid: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn not_installed(mut self) -> Self {
        self.installed = false;
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn with_progress(mut self, updates: Vec<ProgressUpdate>) -> Self {
        self.progress = updates;
        self
    }

    /// Register `pid` as the active subprocess and never detach it
    pub(crate) fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub(crate) fn calls(&self) -> Vec<JobId> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RetrievalBackend for ScriptedBackend {
    async fn probe(&self) -> bool {
        self.installed
    }

    async fn run(
        &self,
        job: &Job,
        reporter: &JobReporter,
        cancel: &CancellationToken,
    ) -> crate::Result<BackendOutcome> {
        self.calls.lock().unwrap().push(job.id.clone());

        let filename = job.filename.clone().unwrap_or_else(|| "model.safetensors".to_string());
        reporter.detected_filename(&filename).await;
        if let Some(pid) = self.pid {
            reporter.attach_process(pid).await;
        }
        for update in &self.progress {
            reporter.progress(update.clone()).await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.script {
            Script::Complete => {
                tokio::fs::create_dir_all(&job.directory).await?;
                let path = job.directory.join(&filename);
                tokio::fs::write(&path, vec![0u8; 2048]).await?;
                Ok(BackendOutcome::Completed {
                    path,
                    size_bytes: 2048,
                    duration: Duration::from_secs(3),
                })
            }
            Script::Fail { should_fallback } => Ok(BackendOutcome::Failed {
                error: Error::SubprocessFailed {
                    code: Some(1),
                    detail: format!("{} scripted failure", self.name),
                },
                should_fallback: *should_fallback,
            }),
            Script::Error => Err(Error::Internal(format!("{} scripted error", self.name))),
            Script::WaitForCancel => {
                cancel.cancelled().await;
                Ok(BackendOutcome::Cancelled)
            }
            Script::Panic => panic!("{} scripted panic", self.name),
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Config pointing into `dir` with no pause between jobs
pub(crate) fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.download.models_root = dir.join("models");
    config.queue.inter_job_delay = Duration::ZERO;
    config.queue.cancel_grace = Duration::from_millis(200);
    config
}

/// Queue wired to the given backends. Keep the TempDir alive.
pub(crate) fn create_test_queue(
    segment: Arc<ScriptedBackend>,
    repo: Arc<ScriptedBackend>,
) -> (QueueService, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let service = QueueService::with_backends(config, segment, repo).unwrap();
    (service, temp_dir)
}

/// Poll `state()` until `done` holds, failing after five seconds
pub(crate) async fn wait_for(
    service: &QueueService,
    done: impl Fn(&QueueSnapshot) -> bool,
) -> QueueSnapshot {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = service.state().await;
        if done(&snapshot) {
            return snapshot;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("condition not reached; last snapshot: {snapshot:#?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until the loop stops and every job is terminal
pub(crate) async fn wait_until_idle(service: &QueueService) -> QueueSnapshot {
    wait_for(service, |s| {
        !s.is_processing && s.jobs.iter().all(|job| job.status.is_terminal())
    })
    .await
}
