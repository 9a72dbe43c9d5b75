use super::*;
use crate::queue::test_helpers::{
    Script, ScriptedBackend, create_test_queue, wait_for, wait_until_idle,
};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tower::ServiceExt;


/// Router over a queue whose segment downloader follows `script`
fn create_test_app(script: Script) -> (Router, QueueService, tempfile::TempDir) {
    let segment = Arc::new(ScriptedBackend::new("aria2c", script));
    let repo = Arc::new(ScriptedBackend::new("hf", Script::Complete));
    let (queue, temp_dir) = create_test_queue(segment, repo);
    let app = create_router(queue.clone(), queue.get_config());
    (app, queue, temp_dir)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns() {
    let (_app, queue, _temp_dir) = create_test_app(Script::Complete);

    let mut config = (*queue.get_config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let queue = queue.clone();
        async move { start_api_server(queue, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished(), "server should still be running");
    api_handle.abort();
}

#[tokio::test]
async fn test_serve_until_stops_on_signal() {
    let (_app, queue, _temp_dir) = create_test_app(Script::Complete);

    let mut config = (*queue.get_config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(serve_until(queue, config, async move {
        rx.await.ok();
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cors_enabled() {
    let (_app, queue, _temp_dir) = create_test_app(Script::Complete);

    let mut config = (*queue.get_config()).clone();
    config.server.api.cors_enabled = true;
    config.server.api.cors_origins = vec!["*".to_string()];
    let app = create_router(queue, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers().contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_specific_origin() {
    let (_app, queue, _temp_dir) = create_test_app(Script::Complete);

    let mut config = (*queue.get_config()).clone();
    config.server.api.cors_origins = vec!["http://localhost:5173".to_string()];
    let app = create_router(queue, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:5173")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:5173"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (_app, queue, _temp_dir) = create_test_app(Script::Complete);

    let mut config = (*queue.get_config()).clone();
    config.server.api.cors_enabled = false;
    let app = create_router(queue, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(!response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_swagger_ui_toggle() {
    let (app, queue, _temp_dir) = create_test_app(Script::Complete);

    let response = app.oneshot(get("/api-docs/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut config = (*queue.get_config()).clone();
    config.server.api.swagger_ui = false;
    let app = create_router(queue, Arc::new(config));

    let response = app.oneshot(get("/api-docs/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
