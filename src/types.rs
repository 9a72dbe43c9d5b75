//! Core types for model-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use utoipa::ToSchema;

/// Unique identifier for a queued job
///
/// Assigned at submission from the wall-clock millisecond and a per-queue
/// sequence number, so ids never repeat within one queue's lifetime.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Build the id for the `seq`-th submission at `millis` since the epoch
    pub fn generate(millis: i64, seq: u64) -> Self {
        Self(format!("job-{millis}-{seq}"))
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hosting platform a URL points at
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// huggingface.co / hf.co
    Huggingface,
    /// civitai.com
    Civitai,
    /// Anything else
    Other,
}

impl Platform {
    /// Classify a URL by its host
    pub fn detect(url: &str) -> Self {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase));

        match host {
            Some(host) => {
                if host_matches(&host, "huggingface.co") || host_matches(&host, "hf.co") {
                    Platform::Huggingface
                } else if host_matches(&host, "civitai.com") {
                    Platform::Civitai
                } else {
                    Platform::Other
                }
            }
            None => {
                // Unparseable input: fall back to a substring check
                let lower = url.to_ascii_lowercase();
                if lower.contains("huggingface.co") || lower.contains("hf.co") {
                    Platform::Huggingface
                } else if lower.contains("civitai.com") {
                    Platform::Civitai
                } else {
                    Platform::Other
                }
            }
        }
    }

    /// Lowercase display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Huggingface => "huggingface",
            Platform::Civitai => "civitai",
            Platform::Other => "other",
        }
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Retrieval backend used for a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Provider {
    /// Repository-aware transfer client (Hugging Face CLI with hf_transfer)
    #[serde(rename = "hf_hub", alias = "repo_transfer_client")]
    RepoTransferClient,
    /// Multi-connection segment downloader (aria2c)
    #[serde(rename = "aria2", alias = "segment_downloader")]
    SegmentDownloader,
}

impl Provider {
    /// Provider picked when the caller does not name one
    pub fn default_for(platform: Platform) -> Self {
        match platform {
            Platform::Huggingface => Provider::RepoTransferClient,
            Platform::Civitai | Platform::Other => Provider::SegmentDownloader,
        }
    }

    /// Wire name of the provider
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::RepoTransferClient => "hf_hub",
            Provider::SegmentDownloader => "aria2",
        }
    }
}

/// Job status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting for the worker
    Queued,
    /// Claimed by the worker, backend running
    Downloading,
    /// Finished with an output file
    Completed,
    /// Finished without an output file
    Error,
    /// Stopped by `cancel()`
    Cancelled,
}

impl Status {
    /// Completed, error and cancelled never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Error | Status::Cancelled)
    }
}

/// A submission to the queue
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct JobRequest {
    /// Source URL
    pub url: String,
    /// Target directory
    pub directory: PathBuf,
    /// Output filename; detected from the server when absent
    #[serde(default)]
    pub filename: Option<String>,
    /// Backend to try first; derived from the platform when absent
    #[serde(default)]
    pub provider: Option<Provider>,
}

impl JobRequest {
    /// Request for `url` into `directory` with defaults for everything else
    pub fn new(url: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            directory: directory.into(),
            ..Default::default()
        }
    }

    /// Set an explicit output filename
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Set the backend to try first
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }
}

/// One queued download and its execution state
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Job {
    /// Unique job identifier
    pub id: JobId,
    /// Source URL
    pub url: String,
    /// Target directory
    pub directory: PathBuf,
    /// Filename requested at submission
    pub filename: Option<String>,
    /// Platform derived from the URL
    pub platform: Platform,
    /// Backend for the current (or last) attempt
    pub provider: Provider,
    /// Lifecycle status
    pub status: Status,
    /// Percent complete (0-100)
    pub progress: u8,
    /// Last speed reported by the backend
    pub speed: String,
    /// Last ETA reported by the backend
    pub eta: String,
    /// Filename the backend is writing to, once known
    pub detected_filename: String,
    /// Human-readable description of the current state
    pub message: String,
    /// Final artifact path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Final artifact size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Submission time
    pub added_at: DateTime<Utc>,
}

impl Job {
    /// Create a queued job from a validated request
    pub(crate) fn new(id: JobId, request: JobRequest) -> Self {
        let platform = Platform::detect(&request.url);
        let provider = request
            .provider
            .unwrap_or_else(|| Provider::default_for(platform));

        Self {
            id,
            url: request.url,
            directory: request.directory,
            filename: request.filename,
            platform,
            provider,
            status: Status::Queued,
            progress: 0,
            speed: String::new(),
            eta: String::new(),
            detected_filename: String::new(),
            message: "Waiting in queue".to_string(),
            output_path: None,
            size_bytes: None,
            added_at: Utc::now(),
        }
    }

    /// Name to show for the job: detected filename, requested filename, or URL
    pub fn display_name(&self) -> &str {
        if !self.detected_filename.is_empty() {
            &self.detected_filename
        } else if let Some(name) = self.filename.as_deref() {
            name
        } else {
            &self.url
        }
    }
}

/// Severity of a user-visible log entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Informational
    Info,
    /// A download finished
    Success,
    /// Degraded but continuing
    Warning,
    /// A job failed
    Error,
}

/// A user-visible log line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LogEntry {
    /// Log text
    pub message: String,
    /// Severity
    pub level: LogLevel,
    /// Local wall-clock time, `HH:MM:SS`
    pub timestamp: String,
}

impl LogEntry {
    /// Stamp a new entry with the current local time
    pub fn now(message: impl Into<String>, level: LogLevel) -> Self {
        Self {
            message: message.into(),
            level,
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
        }
    }
}

/// Read-only projection of the queue published to observers
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct QueueSnapshot {
    /// Jobs in submission order
    #[serde(rename = "queue")]
    pub jobs: Vec<Job>,
    /// Whether the worker loop is running
    pub is_processing: bool,
    /// Most recent log entries, oldest first
    #[serde(rename = "logs")]
    pub recent_logs: Vec<LogEntry>,
}

impl QueueSnapshot {
    /// Look a job up by id
    pub fn job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| &job.id == id)
    }

    /// Number of jobs currently downloading
    pub fn downloading_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|job| job.status == Status::Downloading)
            .count()
    }
}

/// Events pushed to subscribers
///
/// Serialized adjacently tagged, e.g. `{"topic":"downloader.queue","payload":{...}}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload")]
pub enum Event {
    /// Queue state changed
    #[serde(rename = "downloader.queue")]
    Queue(QueueSnapshot),
    /// A log entry was appended
    #[serde(rename = "downloader.log")]
    Log(LogEntry),
    /// The service is shutting down
    #[serde(rename = "downloader.shutdown")]
    Shutdown,
}

impl Event {
    /// Topic name used on the push channel
    pub fn topic(&self) -> &'static str {
        match self {
            Event::Queue(_) => "downloader.queue",
            Event::Log(_) => "downloader.log",
            Event::Shutdown => "downloader.shutdown",
        }
    }

    /// Payload serialized on its own (without the topic wrapper)
    pub fn payload_json(&self) -> serde_json::Result<String> {
        match self {
            Event::Queue(snapshot) => serde_json::to_string(snapshot),
            Event::Log(entry) => serde_json::to_string(entry),
            Event::Shutdown => Ok("{}".to_string()),
        }
    }
}

/// Result of `start()`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    /// A new worker loop was spawned
    Started,
    /// A worker loop was already running; nothing changed
    AlreadyRunning,
}

/// Result of `cancel()`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// Cancellation requested
    Cancelled,
}

/// Installation state of one backend
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BackendCapability {
    /// Backend name
    pub name: String,
    /// Whether the version probe succeeded
    pub installed: bool,
    /// Binary the backend invokes, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
}

/// What the host can currently run
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Capabilities {
    /// Segment downloader (aria2c)
    pub segment_downloader: BackendCapability,
    /// Repository transfer client
    pub repo_transfer_client: BackendCapability,
}

/// Catalogue of model folders under the models root
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ModelDirectories {
    /// Folder name -> absolute or root-relative path
    pub directories: BTreeMap<String, PathBuf>,
    /// Models root
    pub base: PathBuf,
}
