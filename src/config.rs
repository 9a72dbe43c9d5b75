//! Configuration types for model-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Main configuration for the download queue
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Config {
    /// Where models go and which folders are offered to clients
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// External backend binaries and their arguments
    pub tools: ToolsConfig,

    /// Access tokens for gated downloads
    pub tokens: TokensConfig,

    /// Worker loop and broadcast timing
    pub queue: QueueConfig,

    /// API and external server integration
    #[serde(flatten)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Models root directory
    pub fn models_root(&self) -> &PathBuf {
        &self.download.models_root
    }

    /// Reject settings the queue cannot run with
    pub fn validate(&self) -> Result<()> {
        let segment = &self.tools.segment;
        if !(1..=16).contains(&segment.connections_per_server) {
            return Err(Error::Config {
                message: format!(
                    "connections_per_server must be between 1 and 16, got {}",
                    segment.connections_per_server
                ),
                key: Some("tools.segment.connections_per_server".to_string()),
            });
        }
        if segment.split == 0 {
            return Err(Error::Config {
                message: "split must be at least 1".to_string(),
                key: Some("tools.segment.split".to_string()),
            });
        }
        if self.queue.log_capacity == 0 {
            return Err(Error::Config {
                message: "log_capacity must be at least 1".to_string(),
                key: Some("queue.log_capacity".to_string()),
            });
        }
        if self.queue.snapshot_log_count > self.queue.log_capacity {
            return Err(Error::Config {
                message: format!(
                    "snapshot_log_count ({}) cannot exceed log_capacity ({})",
                    self.queue.snapshot_log_count, self.queue.log_capacity
                ),
                key: Some("queue.snapshot_log_count".to_string()),
            });
        }
        Ok(())
    }
}

/// Download location configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Root folder that holds one subfolder per model type (default: "./models")
    #[serde(default = "default_models_root")]
    pub models_root: PathBuf,

    /// Subfolders offered as download targets
    #[serde(default = "default_model_folders")]
    pub model_folders: Vec<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            models_root: default_models_root(),
            model_folders: default_model_folders(),
        }
    }
}

/// External tool paths
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ToolsConfig {
    /// Path to the aria2c executable (auto-detected if None)
    #[serde(default)]
    pub aria2_path: Option<PathBuf>,

    /// Path to the Hugging Face CLI, `hf` or `huggingface-cli` (auto-detected if None)
    #[serde(default)]
    pub hf_cli_path: Option<PathBuf>,

    /// Whether to search PATH for binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Segment downloader arguments
    #[serde(default)]
    pub segment: SegmentConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            aria2_path: None,
            hf_cli_path: None,
            search_path: true,
            segment: SegmentConfig::default(),
        }
    }
}

/// aria2c connection settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SegmentConfig {
    /// `--max-connection-per-server` (default: 4)
    #[serde(default = "default_connections")]
    pub connections_per_server: u32,

    /// `--split` (default: 4)
    #[serde(default = "default_connections")]
    pub split: u32,

    /// `--min-split-size` (default: "1M")
    #[serde(default = "default_min_split_size")]
    pub min_split_size: String,

    /// Verify TLS certificates (default: false)
    #[serde(default)]
    pub check_certificate: bool,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            connections_per_server: default_connections(),
            split: default_connections(),
            min_split_size: default_min_split_size(),
            check_certificate: false,
        }
    }
}

/// Access tokens
///
/// Unset tokens fall back to the `HF_TOKEN` and `CIVITAI_TOKEN` environment
/// variables at the time they are used.
#[derive(Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TokensConfig {
    /// Hugging Face token
    #[serde(default, skip_serializing)]
    pub huggingface: Option<String>,

    /// Civitai API token
    #[serde(default, skip_serializing)]
    pub civitai: Option<String>,
}

impl std::fmt::Debug for TokensConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokensConfig")
            .field("huggingface", &self.huggingface.as_ref().map(|_| "<redacted>"))
            .field("civitai", &self.civitai.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl TokensConfig {
    /// Hugging Face token from config or `HF_TOKEN`
    pub fn huggingface_token(&self) -> Option<String> {
        resolve_token(self.huggingface.as_deref(), "HF_TOKEN")
    }

    /// Civitai token from config or `CIVITAI_TOKEN`
    pub fn civitai_token(&self) -> Option<String> {
        resolve_token(self.civitai.as_deref(), "CIVITAI_TOKEN")
    }
}

fn resolve_token(configured: Option<&str>, env_var: &str) -> Option<String> {
    configured
        .map(str::to_string)
        .or_else(|| std::env::var(env_var).ok())
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Worker loop and broadcast timing
///
/// Durations are (de)serialized as integer milliseconds.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct QueueConfig {
    /// Minimum gap between unforced snapshot publishes (default: 500ms)
    #[serde(default = "default_broadcast_interval", with = "duration_millis_serde")]
    #[schema(value_type = u64)]
    pub broadcast_interval: Duration,

    /// Pause between jobs (default: 300ms)
    #[serde(default = "default_inter_job_delay", with = "duration_millis_serde")]
    #[schema(value_type = u64)]
    pub inter_job_delay: Duration,

    /// Log ring capacity (default: 200)
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    /// Log entries included in a snapshot (default: 50)
    #[serde(default = "default_snapshot_log_count")]
    pub snapshot_log_count: usize,

    /// Filename HEAD probe timeout (default: 15s)
    #[serde(default = "default_head_timeout", with = "duration_millis_serde")]
    #[schema(value_type = u64)]
    pub head_timeout: Duration,

    /// Time a terminated subprocess gets before it is killed (default: 5s)
    #[serde(default = "default_cancel_grace", with = "duration_millis_serde")]
    #[schema(value_type = u64)]
    pub cancel_grace: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            broadcast_interval: default_broadcast_interval(),
            inter_job_delay: default_inter_job_delay(),
            log_capacity: default_log_capacity(),
            snapshot_log_count: default_snapshot_log_count(),
            head_timeout: default_head_timeout(),
            cancel_grace: default_cancel_grace(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8189)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

fn default_models_root() -> PathBuf {
    PathBuf::from("./models")
}

fn default_model_folders() -> Vec<String> {
    [
        "diffusion_models",
        "text_encoders",
        "loras",
        "vae",
        "clip",
        "clip_vision",
        "checkpoints",
        "upscale_models",
        "controlnet",
        "embeddings",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_true() -> bool {
    true
}

fn default_connections() -> u32 {
    4
}

fn default_min_split_size() -> String {
    "1M".to_string()
}

fn default_broadcast_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_inter_job_delay() -> Duration {
    Duration::from_millis(300)
}

fn default_log_capacity() -> usize {
    200
}

fn default_snapshot_log_count() -> usize {
    50
}

fn default_head_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_cancel_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8189))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Duration serialization helper (milliseconds)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
