//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::QueueService;

/// Upper bound on waiting for the worker loop to exit
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl QueueService {
    /// Gracefully shut down the queue
    ///
    /// 1. Stops accepting new jobs and new `start()` calls
    /// 2. Cancels the active job, if any
    /// 3. Waits up to 30 seconds for the worker loop to exit
    /// 4. Emits [`Event::Shutdown`]
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");
        self.accepting_new.store(false, Ordering::SeqCst);

        if self.is_processing().await {
            self.cancel().await;
        }

        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(())) => tracing::info!("worker loop exited"),
                Ok(Err(e)) => tracing::warn!(error = %e, "worker task failed during shutdown"),
                Err(_) => tracing::warn!("timeout waiting for worker loop, proceeding with shutdown"),
            }
        }

        self.broadcaster.send(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
