//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the model-dl REST API using utoipa
//! for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the model-dl REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "model-dl REST API",
        version = "0.1.0",
        description = "REST API for queueing model downloads from Hugging Face, Civitai and plain HTTP sources",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8189", description = "Local development server")
    ),
    paths(
        // Queue
        crate::api::routes::get_state,
        crate::api::routes::add_job,
        crate::api::routes::start_queue,
        crate::api::routes::cancel_queue,
        crate::api::routes::remove_job,
        crate::api::routes::clear_queue,
        crate::api::routes::clear_logs,

        // System
        crate::api::routes::get_directories,
        crate::api::routes::get_capabilities,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::JobId,
        crate::types::Platform,
        crate::types::Provider,
        crate::types::Status,
        crate::types::Job,
        crate::types::LogLevel,
        crate::types::LogEntry,
        crate::types::QueueSnapshot,
        crate::types::StartOutcome,
        crate::types::CancelOutcome,
        crate::types::BackendCapability,
        crate::types::Capabilities,
        crate::types::ModelDirectories,

        // API request/response types from routes
        crate::api::routes::AddJobRequest,
        crate::api::routes::AddJobResponse,
        crate::api::routes::RemoveJobRequest,
        crate::api::routes::StartResponse,
        crate::api::routes::CancelResponse,
        crate::api::routes::ClearResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "queue", description = "Queue control - Add, start, cancel, remove and inspect downloads"),
        (name = "system", description = "System endpoints - Directories, capabilities, health, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_documents_every_route() {
        let spec = ApiDoc::openapi();
        for path in [
            "/state",
            "/add",
            "/start",
            "/cancel",
            "/remove",
            "/clear",
            "/logs/clear",
            "/directories",
            "/capabilities",
            "/health",
            "/openapi.json",
            "/events",
        ] {
            assert!(spec.paths.paths.contains_key(path), "{path} should be documented");
        }
    }

    #[test]
    fn spec_has_schemas_and_tags() {
        let spec = ApiDoc::openapi();

        let components = spec.components.unwrap();
        assert!(components.schemas.contains_key("QueueSnapshot"));
        assert!(components.schemas.contains_key("ApiError"));

        let tags = spec.tags.unwrap();
        let tag_names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert!(tag_names.contains(&"queue"));
        assert!(tag_names.contains(&"system"));
    }

    #[test]
    fn spec_info_and_version() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "model-dl REST API");

        let json = serde_json::to_value(&spec).expect("Should serialize to JSON");
        let version = json.get("openapi").and_then(|v| v.as_str()).unwrap();
        assert!(version.starts_with("3."));
    }
}
