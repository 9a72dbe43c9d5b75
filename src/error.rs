//! Error types for model-dl
//!
//! This module provides the crate-wide error type, including:
//! - One variant per failure class a job or a caller can hit
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for model-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for model-dl
///
/// Backend and filename failures are mostly absorbed by the worker loop and
/// turned into job state; the variants that escape reach callers of the
/// control surface.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "models_root")
        key: Option<String>,
    },

    /// A required request field was empty or absent
    #[error("missing required field: {0}")]
    MissingField(String),

    /// The backend binary is not installed or failed its version probe
    #[error("{0} not installed")]
    BackendNotInstalled(String),

    /// Source URL is malformed for the backend that was asked to handle it
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Backend subprocess exited unsuccessfully or left no output file
    #[error("Download failed (code: {})", code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    SubprocessFailed {
        /// Exit code, absent when the process was killed by a signal
        code: Option<i32>,
        /// What went wrong, e.g. the missing output path
        detail: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Unexpected failure while processing a job
    #[error("internal error: {0}")]
    Internal(String),

    /// Job not found
    #[error("job not found: {0}")]
    NotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "job not found: job-1718000000000-3",
///     "details": { "job_id": "job-1718000000000-3" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "missing_field")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::MissingField(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 422 Unprocessable Entity
            Error::InvalidUrl(_) => 422,

            // 502 Bad Gateway - external process or service failed
            Error::SubprocessFailed { .. } => 502,
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::BackendNotInstalled(_) => 503,
            Error::ShuttingDown => 503,

            // 500 Internal Server Error
            Error::Config { .. } => 500,
            Error::Internal(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::MissingField(_) => "missing_field",
            Error::BackendNotInstalled(_) => "backend_not_installed",
            Error::InvalidUrl(_) => "invalid_url",
            Error::SubprocessFailed { .. } => "subprocess_failure",
            Error::Network(_) => "network_error",
            Error::Internal(_) => "internal_error",
            Error::NotFound(_) => "not_found",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ShuttingDown => "shutting_down",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::NotFound(id) => Some(serde_json::json!({ "job_id": id })),
            Error::MissingField(field) => Some(serde_json::json!({ "field": field })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            Error::SubprocessFailed { code, detail } => Some(serde_json::json!({
                "exit_code": code,
                "detail": detail,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
