//! REST API server demo
//!
//! Runs the download queue behind the REST API until Ctrl+C / SIGTERM.
//!
//! ```text
//! cargo run --example serve [config.json]
//! ```
//!
//! After starting, you can:
//! - View Swagger UI at http://127.0.0.1:8189/swagger-ui
//! - Queue a download via POST http://127.0.0.1:8189/add
//! - Stream events via GET http://127.0.0.1:8189/events

use std::sync::Arc;
use model_dl::{Config, QueueService, api, run_with_shutdown};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,model_dl=debug"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config: Config = match std::env::args().nth(1) {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(&path)?)?,
        None => Config::default(),
    };

    let queue = QueueService::new(config)?;
    let config = queue.get_config();
    let address = config.server.api.bind_address;

    println!("Swagger UI:    http://{address}/swagger-ui");
    println!("Events stream: http://{address}/events");
    println!();
    println!("  curl -X POST http://{address}/add \\");
    println!("    -H 'Content-Type: application/json' \\");
    println!(
        "    -d '{{\"url\": \"https://huggingface.co/stabilityai/sdxl-vae/resolve/main/sdxl_vae.safetensors\", \"directory\": \"./models/vae\"}}'"
    );
    println!("  curl -X POST http://{address}/start");

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(api::serve_until(
        queue.clone(),
        Arc::clone(&config),
        async move {
            stop_rx.await.ok();
        },
    ));

    run_with_shutdown(queue).await?;
    if stop_tx.send(()).is_err() {
        tracing::warn!("API server already stopped");
    }
    server.await??;

    Ok(())
}
