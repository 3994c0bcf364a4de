//! PTaaS - API server entry point
//!
//! Serves the HTTP API and, unless `worker.embedded` is off, runs the scan
//! worker pool in the same process.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ptaas::{Config, create_app, init_tracing, wait_for_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        // Only warn if it's not a "file not found" error
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let config = Config::load().map_err(|e| {
        std::io::Error::other(format!(
            "Failed to load configuration. Check REDIS_URL and PTAAS__* env vars: {}",
            e
        ))
    })?;

    init_tracing(&config.logging)?;

    tracing::info!("Starting PTaaS server...");
    tracing::info!(
        "Configuration loaded: server={}:{}",
        config.server.host,
        config.server.port
    );

    let server_host = config.server.host.clone();
    let server_port = config.server.port;
    let enable_docs = config.server.enable_docs;
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);

    let app_handle = create_app(config)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to create application: {}", e)))?;

    let addr = SocketAddr::new(server_host.parse()?, server_port);

    tracing::info!("Server listening on {}", addr);
    if enable_docs {
        tracing::info!("API documentation available at http://{}/docs", addr);
    } else {
        tracing::info!("API documentation disabled");
    }

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app_handle.router)
        .with_graceful_shutdown(shutdown_signal(
            app_handle.shutdown_token,
            app_handle.worker_pool,
            shutdown_timeout,
        ))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Handle graceful shutdown signals and cancel background tasks
async fn shutdown_signal(
    shutdown_token: CancellationToken,
    worker_pool: Option<JoinHandle<()>>,
    timeout: Duration,
) {
    wait_for_signal().await;

    tracing::info!("Cancelling background tasks...");
    shutdown_token.cancel();

    if let Some(pool) = worker_pool
        && tokio::time::timeout(timeout, pool).await.is_err()
    {
        tracing::warn!("Worker pool did not stop within the shutdown timeout");
    }
}
