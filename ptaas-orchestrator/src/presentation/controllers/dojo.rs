//! Read-only vulnerability management proxies
//!
//! Upstream failures are logged by the client and surface as empty lists.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde_json::Value;

use crate::domain::entities::{FindingSummary, FindingsQuery};
use crate::domain::errors::ScanError;
use crate::presentation::controllers::OrchestratorState;
use crate::presentation::middleware::ApiError;
use crate::presentation::models::{EngagementParams, FindingsParams, TestParams};

/// GET /api/v1/findings - Findings filtered by product and severity
#[utoipa::path(
    get,
    path = "/api/v1/findings",
    params(FindingsParams),
    responses(
        (status = 200, description = "Findings", body = [FindingSummary])
    ),
    tag = "findings"
)]
pub async fn list_findings(
    State(state): State<OrchestratorState>,
    Query(params): Query<FindingsParams>,
) -> Json<Vec<FindingSummary>> {
    let query = FindingsQuery {
        product: params.product,
        severity: params.severity,
        active: params.active,
        limit: params.limit,
    };
    Json(state.vulnerability_management.findings(&query).await)
}

/// GET /api/v1/findings/{id} - Single finding
#[utoipa::path(
    get,
    path = "/api/v1/findings/{id}",
    params(
        ("id" = i64, Path, description = "Finding ID")
    ),
    responses(
        (status = 200, description = "Finding", body = FindingSummary),
        (status = 404, description = "Finding not found", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "findings"
)]
pub async fn get_finding(
    State(state): State<OrchestratorState>,
    Path(id): Path<i64>,
) -> Result<Json<FindingSummary>, ApiError> {
    state
        .vulnerability_management
        .finding(id)
        .await
        .map(Json)
        .ok_or_else(|| ScanError::NotFound(format!("finding {}", id)).into())
}

/// GET /api/v1/dojo/products
#[utoipa::path(
    get,
    path = "/api/v1/dojo/products",
    responses((status = 200, description = "Products")),
    tag = "findings"
)]
pub async fn list_products(State(state): State<OrchestratorState>) -> Json<Vec<Value>> {
    Json(state.vulnerability_management.products().await)
}

/// GET /api/v1/dojo/engagements
#[utoipa::path(
    get,
    path = "/api/v1/dojo/engagements",
    params(EngagementParams),
    responses((status = 200, description = "Engagements")),
    tag = "findings"
)]
pub async fn list_engagements(
    State(state): State<OrchestratorState>,
    Query(params): Query<EngagementParams>,
) -> Json<Vec<Value>> {
    Json(
        state
            .vulnerability_management
            .engagements(params.product_id)
            .await,
    )
}

/// GET /api/v1/dojo/tests
#[utoipa::path(
    get,
    path = "/api/v1/dojo/tests",
    params(TestParams),
    responses((status = 200, description = "Tests")),
    tag = "findings"
)]
pub async fn list_tests(
    State(state): State<OrchestratorState>,
    Query(params): Query<TestParams>,
) -> Json<Vec<Value>> {
    Json(state.vulnerability_management.tests(params.engagement_id).await)
}
