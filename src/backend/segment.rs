//! Multi-connection segment downloader backed by `aria2c`

use super::process::{ConsoleLines, probe_binary, stop_child};
use super::traits::{BackendOutcome, RetrievalBackend};
use crate::config::{Config, SegmentConfig};
use crate::error::{Error, Result};
use crate::filename::{
    ACCEPT_BINARY, BROWSER_USER_AGENT, FilenameResolver, with_civitai_token,
};
use crate::progress::parse_progress_line;
use crate::queue::JobReporter;
use crate::types::{Job, LogLevel, Platform};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Segment downloader using the external `aria2c` binary
///
/// # Examples
///
/// ```no_run
/// use model_dl::backend::Aria2Backend;
/// use model_dl::Config;
/// use std::path::PathBuf;
///
/// # fn main() -> model_dl::Result<()> {
/// let config = Config::default();
///
/// // Create with explicit path
/// let backend = Aria2Backend::new(PathBuf::from("/usr/bin/aria2c"), &config)?;
///
/// // Or auto-discover from PATH
/// let backend = Aria2Backend::from_path(&config)?;
/// # Ok(())
/// # }
/// ```
pub struct Aria2Backend {
    binary_path: PathBuf,
    segment: SegmentConfig,
    resolver: FilenameResolver,
    civitai_token: Option<String>,
    cancel_grace: Duration,
}

impl Aria2Backend {
    /// Create a backend with an explicit binary path
    pub fn new(binary_path: PathBuf, config: &Config) -> Result<Self> {
        Ok(Self {
            binary_path,
            segment: config.tools.segment.clone(),
            resolver: FilenameResolver::new(config)?,
            civitai_token: config.tokens.civitai_token(),
            cancel_grace: config.queue.cancel_grace,
        })
    }

    /// Attempt to find `aria2c` in PATH
    pub fn from_path(config: &Config) -> Result<Option<Self>> {
        match which::which("aria2c") {
            Ok(path) => Self::new(path, config).map(Some),
            Err(_) => Ok(None),
        }
    }

    async fn pick_filename(&self, job: &Job, reporter: &JobReporter) -> String {
        if let Some(name) = job.filename.as_deref().map(str::trim)
            && !name.is_empty()
        {
            return name.to_string();
        }
        reporter.message("Detecting filename...").await;
        self.resolver.resolve(&job.url, job.platform).await
    }
}

/// Command line for one aria2c transfer
pub fn segment_args(
    segment: &SegmentConfig,
    url: &str,
    directory: &Path,
    filename: &str,
    platform: Platform,
) -> Vec<String> {
    let mut args = vec![
        "--file-allocation=none".to_string(),
        format!("--max-connection-per-server={}", segment.connections_per_server),
        format!("--split={}", segment.split),
        format!("--min-split-size={}", segment.min_split_size),
        "--continue=true".to_string(),
        "--allow-overwrite=true".to_string(),
        "--auto-file-renaming=false".to_string(),
        "--console-log-level=notice".to_string(),
        "--summary-interval=1".to_string(),
        "--human-readable=true".to_string(),
        "--show-console-readout=true".to_string(),
    ];
    if !segment.check_certificate {
        args.push("--check-certificate=false".to_string());
    }
    args.push(format!("--dir={}", directory.display()));
    args.push(format!("--out={filename}"));
    args.push(format!("--header=User-Agent: {BROWSER_USER_AGENT}"));
    args.push(format!("--header=Accept: {ACCEPT_BINARY}"));
    if platform == Platform::Civitai {
        args.push("--header=Referer: https://civitai.com/".to_string());
    }
    args.push(url.to_string());
    args
}

#[async_trait]
impl RetrievalBackend for Aria2Backend {
    async fn probe(&self) -> bool {
        probe_binary(&self.binary_path, &["--version"]).await
    }

    async fn run(
        &self,
        job: &Job,
        reporter: &JobReporter,
        cancel: &CancellationToken,
    ) -> Result<BackendOutcome> {
        let filename = self.pick_filename(job, reporter).await;
        reporter.detected_filename(&filename).await;
        reporter.message(format!("Downloading {filename}...")).await;
        reporter
            .log(format!("File: {filename}"), LogLevel::Info)
            .await;

        tokio::fs::create_dir_all(&job.directory).await?;

        if cancel.is_cancelled() {
            return Ok(BackendOutcome::Cancelled);
        }

        let url = with_civitai_token(&job.url, job.platform, self.civitai_token.as_deref());
        let args = segment_args(&self.segment, &url, &job.directory, &filename, job.platform);
        let started = Instant::now();

        let mut child = Command::new(&self.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(pid) = child.id() {
            tracing::debug!(job_id = %job.id, pid, backend = self.name(), "subprocess started");
            reporter.attach_process(pid).await;
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("aria2c stdout was not captured".to_string()))?;
        let mut lines = ConsoleLines::new(stdout);

        let cancelled = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break true,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        let update = parse_progress_line(&line);
                        if !update.is_empty() {
                            reporter.progress(update).await;
                        }
                        if cancel.is_cancelled() {
                            break true;
                        }
                    }
                    Ok(None) => break false,
                    Err(e) => {
                        tracing::warn!(job_id = %job.id, error = %e, "failed reading aria2c output");
                        break false;
                    }
                },
            }
        };

        if cancelled {
            stop_child(&mut child, self.cancel_grace).await;
            reporter.detach_process().await;
            return Ok(BackendOutcome::Cancelled);
        }

        let status = child.wait().await?;
        reporter.detach_process().await;

        if cancel.is_cancelled() {
            return Ok(BackendOutcome::Cancelled);
        }

        let path = job.directory.join(&filename);
        if !status.success() {
            return Ok(BackendOutcome::fatal(Error::SubprocessFailed {
                code: status.code(),
                detail: "aria2c exited with an error".to_string(),
            }));
        }

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(BackendOutcome::Completed {
                path,
                size_bytes: meta.len(),
                duration: started.elapsed(),
            }),
            _ => Ok(BackendOutcome::fatal(Error::SubprocessFailed {
                code: status.code(),
                detail: format!("output file missing: {}", path.display()),
            })),
        }
    }

    fn name(&self) -> &'static str {
        "aria2c"
    }

    fn binary(&self) -> Option<&Path> {
        Some(&self.binary_path)
    }
}
