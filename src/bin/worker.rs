//! PTaaS - standalone scan worker
//!
//! Consumes the shared broker queue. Run as many of these as the scanners can
//! handle; set `worker.embedded = false` on the API server when doing so.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use ptaas::ptaas_core::config::QueueBackend;
use ptaas::{Backend, Config, init_tracing, spawn_workers, wait_for_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        eprintln!("Warning: Failed to load .env file: {}", e);
    }

    let config = Config::load().map_err(|e| {
        std::io::Error::other(format!("Failed to load configuration: {}", e))
    })?;

    init_tracing(&config.logging)?;

    if config.queue.backend == QueueBackend::Memory {
        return Err(std::io::Error::other(
            "The standalone worker needs a shared broker; set queue.backend = \"redis\"",
        )
        .into());
    }

    tracing::info!(
        concurrency = config.worker.concurrency,
        "Starting PTaaS scan worker..."
    );

    let backend = Backend::connect(&config)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to connect backend: {}", e)))?;

    if config.storage.create_bucket {
        ptaas::artifact_store(&config).await;
    }

    let shutdown_token = CancellationToken::new();
    let pool = spawn_workers(&config, &backend, shutdown_token.clone());

    wait_for_signal().await;
    shutdown_token.cancel();

    let timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
    if tokio::time::timeout(timeout, pool).await.is_err() {
        tracing::warn!("Worker pool did not stop within the shutdown timeout");
    }

    tracing::info!("Worker shutdown complete");
    Ok(())
}
