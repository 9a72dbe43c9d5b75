//! System handlers: directories, capabilities, health, OpenAPI, events.

use crate::api::AppState;
use crate::types::{Capabilities, Event, ModelDirectories};
use axum::{
    Json,
    extract::State,
    response::{
        IntoResponse,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// GET /directories - Model folders clients can target
#[utoipa::path(
    get,
    path = "/directories",
    tag = "system",
    responses(
        (status = 200, description = "Model folder catalogue", body = ModelDirectories)
    )
)]
pub async fn get_directories(State(state): State<AppState>) -> Json<ModelDirectories> {
    Json(state.queue.model_directories())
}

/// GET /capabilities - Which backends are installed
#[utoipa::path(
    get,
    path = "/capabilities",
    tag = "system",
    responses(
        (status = 200, description = "Backend availability", body = Capabilities)
    )
)]
pub async fn get_capabilities(State(state): State<AppState>) -> Json<Capabilities> {
    Json(state.queue.capabilities().await)
}

/// GET /health - Health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy")
    )
)]
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}

/// GET /events - Server-sent events stream
///
/// Each frame's event name is the topic (`downloader.queue`,
/// `downloader.log`) and its data the JSON payload. The stream ends after
/// `downloader.shutdown`.
#[utoipa::path(
    get,
    path = "/events",
    tag = "system",
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream")
    )
)]
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let receiver = state.queue.subscribe();

    let frames = BroadcastStream::new(receiver)
        .take_while(|result| !matches!(result, Ok(Event::Shutdown)))
        .filter_map(|result| match result {
            Ok(event) => to_frame(&event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!("SSE client lagged, skipped {} events", skipped);
                Some(Ok(SseEvent::default().event("error").data(format!(
                    r#"{{"error":"lagged","skipped":{}}}"#,
                    skipped
                ))))
            }
        })
        .chain(tokio_stream::iter(to_frame(&Event::Shutdown)));

    Sse::new(frames).keep_alive(KeepAlive::default())
}

fn to_frame(event: &Event) -> Option<Result<SseEvent, Infallible>> {
    match event.payload_json() {
        Ok(data) => Some(Ok(SseEvent::default().event(event.topic()).data(data))),
        Err(e) => {
            tracing::warn!("Failed to serialize event to JSON: {}", e);
            None
        }
    }
}
