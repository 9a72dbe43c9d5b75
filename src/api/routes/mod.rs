//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`queue`] - Job control and queue state
//! - [`system`] - Directories, capabilities, health, events, OpenAPI

use crate::types::{CancelOutcome, JobId, Provider, StartOutcome};
use serde::{Deserialize, Serialize};

mod queue;
mod system;

pub use queue::*;
pub use system::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Request body for POST /add
///
/// Missing `url` or `directory` is reported as `missing_field` rather than
/// a deserialization error.
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct AddJobRequest {
    /// Source URL
    #[serde(default)]
    pub url: String,
    /// Destination directory
    #[serde(default)]
    pub directory: String,
    /// Output filename; resolved from the server when omitted
    #[serde(default)]
    pub filename: Option<String>,
    /// Backend override (`hf_hub` or `aria2`)
    #[serde(default)]
    pub provider: Option<Provider>,
}

/// Response for POST /add
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct AddJobResponse {
    /// Id of the queued job
    pub id: JobId,
}

/// Request body for POST /remove
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct RemoveJobRequest {
    /// Id of the job to remove
    #[serde(default)]
    pub id: String,
}

/// Response for POST /start
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct StartResponse {
    /// `started` or `already_running`
    pub status: StartOutcome,
}

/// Response for POST /cancel
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CancelResponse {
    /// Always `cancelled`
    pub status: CancelOutcome,
}

/// Response for POST /clear
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ClearResponse {
    /// Always `cleared`
    pub status: String,
    /// Number of finished jobs removed
    pub removed: usize,
}
