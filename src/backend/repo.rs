//! Repository transfer client backed by the Hugging Face CLI
//!
//! The CLI downloads into a repo-shaped tree under the job directory
//! (`<dir>/<path/in/repo>`) and keeps metadata in `<dir>/.cache/huggingface`.
//! After a successful run the file is moved to `<dir>/<filename>` and the
//! leftovers are removed.

use super::process::{ConsoleLines, probe_binary, stop_child};
use super::traits::{BackendOutcome, RetrievalBackend};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::progress::parse_transfer_line;
use crate::queue::JobReporter;
use crate::types::{Job, LogLevel, Platform};
use crate::utils::remove_empty_dirs;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Location of one file inside a model repository
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoFile {
    /// `owner/name`
    pub repo_id: String,
    /// `model` unless the URL names a dataset or space
    pub repo_type: Option<String>,
    /// Branch, tag or commit
    pub revision: String,
    /// Path of the file inside the repository
    pub path_in_repo: String,
}

impl RepoFile {
    /// Last component of the in-repo path
    pub fn file_name(&self) -> &str {
        self.path_in_repo
            .rsplit('/')
            .next()
            .unwrap_or(&self.path_in_repo)
    }
}

/// Split a Hugging Face file URL into repository coordinates
///
/// Accepts `/<owner>/<repo>/{resolve|blob}/<revision>/<path...>`, optionally
/// prefixed by `datasets/` or `spaces/`.
pub fn parse_repo_url(url: &str) -> Result<RepoFile> {
    let parsed = url::Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
    if Platform::detect(url) != Platform::Huggingface {
        return Err(Error::InvalidUrl(format!("{url}: not a Hugging Face URL")));
    }

    let mut segments: Vec<String> = parsed
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(|s| {
                    urlencoding::decode(s)
                        .map(|cow| cow.into_owned())
                        .unwrap_or_else(|_| s.to_string())
                })
                .collect()
        })
        .unwrap_or_default();

    let repo_type = match segments.first().map(String::as_str) {
        Some("datasets") => Some("dataset".to_string()),
        Some("spaces") => Some("space".to_string()),
        _ => None,
    };
    if repo_type.is_some() {
        segments.remove(0);
    }

    if segments.len() < 5 {
        return Err(Error::InvalidUrl(format!(
            "{url}: expected /<owner>/<repo>/resolve/<revision>/<path>"
        )));
    }
    if !matches!(segments[2].as_str(), "resolve" | "blob") {
        return Err(Error::InvalidUrl(format!(
            "{url}: unsupported path kind '{}'",
            segments[2]
        )));
    }

    Ok(RepoFile {
        repo_id: format!("{}/{}", segments[0], segments[1]),
        repo_type,
        revision: segments[3].clone(),
        path_in_repo: segments[4..].join("/"),
    })
}

/// Hugging Face CLI (`hf`, or the older `huggingface-cli`) with hf_transfer enabled
pub struct HfCliBackend {
    binary_path: PathBuf,
    token: Option<String>,
    cancel_grace: Duration,
}

impl HfCliBackend {
    /// Create a backend with an explicit binary path
    pub fn new(binary_path: PathBuf, config: &Config) -> Self {
        Self {
            binary_path,
            token: config.tokens.huggingface_token(),
            cancel_grace: config.queue.cancel_grace,
        }
    }

    /// Attempt to find `hf`, then `huggingface-cli`, in PATH
    pub fn from_path(config: &Config) -> Option<Self> {
        ["hf", "huggingface-cli"]
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(|path| Self::new(path, config))
    }

    fn command(&self, file: &RepoFile, directory: &Path) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg("download")
            .arg(&file.repo_id)
            .arg(&file.path_in_repo)
            .arg("--revision")
            .arg(&file.revision)
            .arg("--local-dir")
            .arg(directory);
        if let Some(repo_type) = &file.repo_type {
            cmd.arg("--repo-type").arg(repo_type);
        }
        cmd.env("HF_HUB_ENABLE_HF_TRANSFER", "1");
        if let Some(token) = &self.token {
            cmd.env("HF_TOKEN", token);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Move the repo-shaped download to `directory/filename` and tidy up
///
/// Returns the final path.
pub(crate) async fn flatten_download(
    directory: &Path,
    path_in_repo: &str,
    filename: &str,
    remove_cache: bool,
) -> Result<PathBuf> {
    let downloaded = directory.join(path_in_repo);
    let target = directory.join(filename);

    if downloaded != target {
        tokio::fs::rename(&downloaded, &target).await?;
        if let Some(parent) = downloaded.parent() {
            remove_empty_dirs(parent, directory).await;
        }
    }

    if remove_cache {
        let cache = directory.join(".cache");
        if let Err(e) = tokio::fs::remove_dir_all(&cache).await {
            tracing::debug!(path = %cache.display(), error = %e, "transfer metadata not removed");
        }
    }

    Ok(target)
}

#[async_trait]
impl RetrievalBackend for HfCliBackend {
    async fn probe(&self) -> bool {
        probe_binary(&self.binary_path, &["version"]).await
    }

    async fn run(
        &self,
        job: &Job,
        reporter: &JobReporter,
        cancel: &CancellationToken,
    ) -> Result<BackendOutcome> {
        let file = match parse_repo_url(&job.url) {
            Ok(file) => file,
            Err(e) => return Ok(BackendOutcome::retryable(e)),
        };

        let filename = job
            .filename
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| file.file_name())
            .to_string();

        reporter.detected_filename(&filename).await;
        reporter.message(format!("Downloading {filename}...")).await;
        reporter
            .log(format!("Repository: {}", file.repo_id), LogLevel::Info)
            .await;

        tokio::fs::create_dir_all(&job.directory).await?;
        let cache_existed = tokio::fs::try_exists(job.directory.join(".cache"))
            .await
            .unwrap_or(true);

        if cancel.is_cancelled() {
            return Ok(BackendOutcome::Cancelled);
        }

        let started = Instant::now();
        let mut child = self.command(&file, &job.directory).spawn()?;
        if let Some(pid) = child.id() {
            tracing::debug!(job_id = %job.id, pid, backend = self.name(), "subprocess started");
            reporter.attach_process(pid).await;
        }

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("hf stderr was not captured".to_string()))?;
        let mut lines = ConsoleLines::new(stderr);
        let mut last_message = String::new();

        let cancelled = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break true,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        let update = parse_transfer_line(&line);
                        if update.is_empty() {
                            last_message = line.trim().to_string();
                        } else {
                            reporter.progress(update).await;
                        }
                        if cancel.is_cancelled() {
                            break true;
                        }
                    }
                    Ok(None) => break false,
                    Err(e) => {
                        tracing::warn!(job_id = %job.id, error = %e, "failed reading hf output");
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

        if !status.success() {
            return Ok(BackendOutcome::retryable(Error::SubprocessFailed {
                code: status.code(),
                detail: last_message,
            }));
        }

        let path = match flatten_download(
            &job.directory,
            &file.path_in_repo,
            &filename,
            !cache_existed,
        )
        .await
        {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "could not move downloaded file");
                return Ok(BackendOutcome::retryable(Error::SubprocessFailed {
                    code: status.code(),
                    detail: format!("output file missing: {e}"),
                }));
            }
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(BackendOutcome::Completed {
                path,
                size_bytes: meta.len(),
                duration: started.elapsed(),
            }),
            _ => Ok(BackendOutcome::retryable(Error::SubprocessFailed {
                code: status.code(),
                detail: format!("output file missing: {}", path.display()),
            })),
        }
    }

    fn name(&self) -> &'static str {
        "hf"
    }

    fn binary(&self) -> Option<&Path> {
        Some(&self.binary_path)
    }
}
