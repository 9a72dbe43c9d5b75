//! Common test utilities for model-dl integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use model_dl::{
    BackendOutcome, Config, Error, Event, Job, JobReporter, ProgressUpdate, QueueService,
    QueueSnapshot, RetrievalBackend,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tokio_util::sync::CancellationToken;

/// Config rooted in `dir` with no external tools and no pause between jobs
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.download.models_root = dir.join("models");
    config.tools.search_path = false;
    config.queue.inter_job_delay = Duration::ZERO;
    config.queue.cancel_grace = Duration::from_millis(200);
    config
}

/// What a [`FakeBackend`] does for every job
#[derive(Clone, Copy, Debug)]
pub enum Behaviour {
    /// Write `bytes` zero bytes to the output file
    Write { bytes: usize },
    /// Fail and ask for the other backend
    FailRetryable,
    /// Park until cancelled
    Hang,
}

/// Backend that implements the public trait without any subprocess
pub struct FakeBackend {
    name: &'static str,
    behaviour: Behaviour,
    runs: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            name,
            behaviour,
            runs: Mutex::new(Vec::new()),
        })
    }

    /// Urls this backend was asked to fetch, in order
    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl RetrievalBackend for FakeBackend {
    async fn probe(&self) -> bool {
        true
    }

    async fn run(
        &self,
        job: &Job,
        reporter: &JobReporter,
        cancel: &CancellationToken,
    ) -> model_dl::Result<BackendOutcome> {
        self.runs.lock().unwrap().push(job.url.clone());

        let filename = job
            .filename
            .clone()
            .unwrap_or_else(|| "download.safetensors".to_string());
        reporter.detected_filename(&filename).await;
        reporter
            .progress(ProgressUpdate {
                percent: Some(50),
                speed: Some("10MiB".to_string()),
                eta: Some("1s".to_string()),
            })
            .await;

        match self.behaviour {
            Behaviour::Write { bytes } => {
                tokio::fs::create_dir_all(&job.directory).await?;
                let path = job.directory.join(&filename);
                tokio::fs::write(&path, vec![0u8; bytes]).await?;
                Ok(BackendOutcome::Completed {
                    path,
                    size_bytes: bytes as u64,
                    duration: Duration::from_secs(75),
                })
            }
            Behaviour::FailRetryable => Ok(BackendOutcome::retryable(Error::SubprocessFailed {
                code: Some(2),
                detail: format!("{} refused", self.name),
            })),
            Behaviour::Hang => {
                cancel.cancelled().await;
                Ok(BackendOutcome::Cancelled)
            }
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Receive events until a queue snapshot satisfies `done`
pub async fn wait_for_snapshot(
    events: &mut Receiver<Event>,
    done: impl Fn(&QueueSnapshot) -> bool,
) -> QueueSnapshot {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Ok(Event::Queue(snapshot)) if done(&snapshot) => return snapshot,
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event channel failed: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for queue snapshot")
}

/// Poll until the worker loop has stopped
pub async fn wait_until_stopped(queue: &QueueService) -> QueueSnapshot {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let state = queue.state().await;
            if !state.is_processing {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("worker loop did not stop")
}
