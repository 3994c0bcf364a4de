//! Raw artifact access

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;

use crate::domain::entities::ArtifactObject;
use crate::domain::errors::ScanError;
use crate::presentation::controllers::OrchestratorState;
use crate::presentation::middleware::ApiError;
use crate::presentation::models::ArtifactListParams;

/// GET /api/v1/results/{job_id}/download - Raw tool output of a completed scan
#[utoipa::path(
    get,
    path = "/api/v1/results/{job_id}/download",
    params(
        ("job_id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Raw artifact", content_type = "application/octet-stream"),
        (status = 404, description = "No completed scan or no stored artifact", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "results"
)]
pub async fn download_result(
    State(state): State<OrchestratorState>,
    Path(job_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let artifact = state.artifact_use_case.download(job_id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, artifact.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact.filename),
            ),
        ],
        artifact.content,
    )
        .into_response())
}

/// GET /api/v1/artifacts - List stored artifacts
#[utoipa::path(
    get,
    path = "/api/v1/artifacts",
    params(ArtifactListParams),
    responses(
        (status = 200, description = "Stored artifacts", body = [ArtifactObject]),
        (status = 500, description = "Object store unavailable", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "results"
)]
pub async fn list_artifacts(
    State(state): State<OrchestratorState>,
    Query(params): Query<ArtifactListParams>,
) -> Result<Json<Vec<ArtifactObject>>, ApiError> {
    let objects = state
        .artifact_use_case
        .list(params.prefix.as_deref())
        .await?;
    Ok(Json(objects))
}

/// DELETE /api/v1/artifacts/{key} - Remove a stored artifact
#[utoipa::path(
    delete,
    path = "/api/v1/artifacts/{key}",
    params(
        ("key" = String, Path, description = "Artifact key")
    ),
    responses(
        (status = 204, description = "Artifact deleted"),
        (status = 400, description = "Empty key", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "results"
)]
pub async fn delete_artifact(
    State(state): State<OrchestratorState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    if key.trim().is_empty() {
        return Err(ScanError::Validation("artifact key must not be empty".to_string()).into());
    }
    state.artifact_use_case.delete(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}
