//! REST API server module
//!
//! Exposes the download queue over HTTP: control endpoints, a snapshot
//! endpoint, a Server-Sent Events stream and an OpenAPI document.

use crate::{Config, QueueService, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Queue
/// - `GET /state` - Jobs, loop flag and recent logs
/// - `POST /add` - Queue a download
/// - `POST /start` - Start the worker loop
/// - `POST /cancel` - Cancel the active job and stop the loop
/// - `POST /remove` - Remove one job
/// - `POST /clear` - Remove finished jobs
/// - `POST /logs/clear` - Empty the log buffer
///
/// ## System
/// - `GET /directories` - Model folder catalogue
/// - `GET /capabilities` - Backend availability
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Swagger UI (if enabled)
/// - `GET /events` - Server-sent events stream
pub fn create_router(queue: QueueService, config: Arc<Config>) -> Router {
    let state = AppState::new(queue, config.clone());

    let router = Router::new()
        // Queue
        .route("/state", get(routes::get_state))
        .route("/add", post(routes::add_job))
        .route("/start", post(routes::start_queue))
        .route("/cancel", post(routes::cancel_queue))
        .route("/remove", post(routes::remove_job))
        .route("/clear", post(routes::clear_queue))
        .route("/logs/clear", post(routes::clear_logs))
        // System
        .route("/directories", get(routes::get_directories))
        .route("/capabilities", get(routes::get_capabilities))
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    // SwaggerUi serves its own copy of the document, so it needs a distinct path
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    if config.server.api.cors_enabled {
        router.layer(build_cors_layer(&config.server.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer from the configured origins (`"*"` allows any)
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Serve the API on the configured bind address until the process exits
///
/// # Example
///
/// ```no_run
/// use model_dl::{Config, QueueService};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let queue = QueueService::new((*config).clone())?;
///
/// model_dl::api::start_api_server(queue, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(queue: QueueService, config: Arc<Config>) -> Result<()> {
    serve_until(queue, config, std::future::pending::<()>()).await
}

/// Serve the API until `shutdown` resolves
///
/// In-flight requests are allowed to finish. Open `/events` streams end
/// after forwarding the queue's shutdown event, so call
/// [`QueueService::shutdown`] before or alongside resolving `shutdown`.
pub async fn serve_until(
    queue: QueueService,
    config: Arc<Config>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let bind_address = config.server.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(queue, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
