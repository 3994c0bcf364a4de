//! Health endpoint

use axum::{extract::State, response::Json};
use chrono::Utc;

use crate::presentation::controllers::OrchestratorState;
use crate::presentation::models::HealthResponse;

/// GET /health - Service and dependency status
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service status", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<OrchestratorState>) -> Json<HealthResponse> {
    let queue_depth = match state.queue.depth().await {
        Ok(depth) => Some(depth),
        Err(e) => {
            tracing::warn!(error = %e, "Broker health probe failed");
            None
        }
    };

    Json(HealthResponse {
        status: if queue_depth.is_some() { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        broker_reachable: queue_depth.is_some(),
        queue_depth,
        dependencies: state.dependencies.as_ref().clone(),
    })
}
