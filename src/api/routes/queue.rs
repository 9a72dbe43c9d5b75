//! Queue control handlers.

use super::{
    AddJobRequest, AddJobResponse, CancelResponse, ClearResponse, RemoveJobRequest, StartResponse,
};
use crate::api::AppState;
use crate::error::Error;
use crate::types::{JobRequest, QueueSnapshot};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// GET /state - Current jobs, loop flag and recent logs
#[utoipa::path(
    get,
    path = "/state",
    tag = "queue",
    responses(
        (status = 200, description = "Queue snapshot", body = QueueSnapshot)
    )
)]
pub async fn get_state(State(state): State<AppState>) -> Json<QueueSnapshot> {
    Json(state.queue.state().await)
}

/// POST /add - Queue a download
#[utoipa::path(
    post,
    path = "/add",
    tag = "queue",
    request_body = AddJobRequest,
    responses(
        (status = 201, description = "Job queued", body = AddJobResponse),
        (status = 400, description = "url or directory missing", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn add_job(State(state): State<AppState>, Json(body): Json<AddJobRequest>) -> Response {
    let mut request = JobRequest::new(body.url, body.directory);
    request.filename = body.filename;
    request.provider = body.provider;

    match state.queue.add(request).await {
        Ok(id) => (StatusCode::CREATED, Json(AddJobResponse { id })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /start - Start processing the queue
#[utoipa::path(
    post,
    path = "/start",
    tag = "queue",
    responses(
        (status = 200, description = "Loop started or already running", body = StartResponse),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn start_queue(State(state): State<AppState>) -> Response {
    match state.queue.start().await {
        Ok(status) => Json(StartResponse { status }).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /cancel - Cancel the active job and stop the loop
#[utoipa::path(
    post,
    path = "/cancel",
    tag = "queue",
    responses(
        (status = 200, description = "Cancellation requested", body = CancelResponse)
    )
)]
pub async fn cancel_queue(State(state): State<AppState>) -> Json<CancelResponse> {
    let status = state.queue.cancel().await;
    Json(CancelResponse { status })
}

/// POST /remove - Remove one job
#[utoipa::path(
    post,
    path = "/remove",
    tag = "queue",
    request_body = RemoveJobRequest,
    responses(
        (status = 200, description = "Job removed"),
        (status = 400, description = "id missing", body = crate::error::ApiError),
        (status = 404, description = "No job with this id", body = crate::error::ApiError)
    )
)]
pub async fn remove_job(
    State(state): State<AppState>,
    Json(body): Json<RemoveJobRequest>,
) -> Response {
    let id = body.id.trim();
    if id.is_empty() {
        return Error::MissingField("id".to_string()).into_response();
    }

    match state.queue.remove(&id.into()).await {
        Ok(()) => Json(json!({"status": "removed"})).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /clear - Remove completed, failed and cancelled jobs
#[utoipa::path(
    post,
    path = "/clear",
    tag = "queue",
    responses(
        (status = 200, description = "Finished jobs removed", body = ClearResponse)
    )
)]
pub async fn clear_queue(State(state): State<AppState>) -> Json<ClearResponse> {
    let removed = state.queue.clear().await;
    Json(ClearResponse {
        status: "cleared".to_string(),
        removed,
    })
}

/// POST /logs/clear - Empty the log buffer
#[utoipa::path(
    post,
    path = "/logs/clear",
    tag = "queue",
    responses(
        (status = 200, description = "Logs cleared")
    )
)]
pub async fn clear_logs(State(state): State<AppState>) -> impl IntoResponse {
    state.queue.clear_logs().await;
    Json(json!({"status": "cleared"}))
}
