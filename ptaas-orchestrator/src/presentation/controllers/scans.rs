//! Scan submission and tracking

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::domain::entities::{ActiveScanRecord, CompletedLogEntry};
use crate::domain::errors::ScanError;
use crate::domain::value_objects::ScanType;
use crate::presentation::controllers::OrchestratorState;
use crate::presentation::middleware::ApiError;
use crate::presentation::models::{ScanAcceptedResponse, ScanStatusResponse, ScanSubmission};

/// POST /api/v1/scans/{scan_type} - Queue a scan
#[utoipa::path(
    post,
    path = "/api/v1/scans/{scan_type}",
    params(
        ("scan_type" = String, Path, description = "network (nmap), web (zap) or injection (sqlmap)")
    ),
    request_body = ScanSubmission,
    responses(
        (status = 202, description = "Scan queued", body = ScanAcceptedResponse),
        (status = 400, description = "Invalid scan request", body = crate::presentation::models::ErrorResponse),
        (status = 500, description = "Queue or job store unavailable", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "scans"
)]
pub async fn submit_scan(
    State(state): State<OrchestratorState>,
    Path(scan_type): Path<String>,
    Json(submission): Json<ScanSubmission>,
) -> Result<(StatusCode, Json<ScanAcceptedResponse>), ApiError> {
    let scan_type = ScanType::from_path_segment(&scan_type)
        .ok_or_else(|| ScanError::Validation(format!("unknown scan type '{}'", scan_type)))?;

    let request = state
        .submit_scan_use_case
        .execute(scan_type, &submission.target, submission.options.as_deref())
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ScanAcceptedResponse::from(&request)),
    ))
}

/// GET /api/v1/scans/{job_id} - Job state and progress
#[utoipa::path(
    get,
    path = "/api/v1/scans/{job_id}",
    params(
        ("job_id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job state", body = ScanStatusResponse),
        (status = 400, description = "Malformed job id", body = crate::presentation::models::ErrorResponse),
        (status = 404, description = "Unknown job", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "scans"
)]
pub async fn get_scan(
    State(state): State<OrchestratorState>,
    Path(job_id): Path<String>,
) -> Result<Json<ScanStatusResponse>, ApiError> {
    let job_id = Uuid::parse_str(&job_id)
        .map_err(|_| ScanError::Validation(format!("'{}' is not a valid job id", job_id)))?;

    let job_state = state.scan_status_use_case.execute(job_id).await?;
    Ok(Json(ScanStatusResponse::from_state(job_id, &job_state)))
}

/// GET /api/v1/scans/active - Refresh and list submitted scans
#[utoipa::path(
    get,
    path = "/api/v1/scans/active",
    responses(
        (status = 200, description = "Active scans; terminal scans appear once", body = [ActiveScanRecord])
    ),
    tag = "scans"
)]
pub async fn list_active(
    State(state): State<OrchestratorState>,
) -> Result<Json<Vec<ActiveScanRecord>>, ApiError> {
    let records = state
        .registry
        .refresh_active()
        .await
        .map_err(|e| ScanError::Store(e.to_string()))?;
    Ok(Json(records))
}

/// GET /api/v1/scans/completed - Completed scans, newest first
#[utoipa::path(
    get,
    path = "/api/v1/scans/completed",
    responses(
        (status = 200, description = "Completed scan log", body = [CompletedLogEntry])
    ),
    tag = "scans"
)]
pub async fn list_completed(
    State(state): State<OrchestratorState>,
) -> Result<Json<Vec<CompletedLogEntry>>, ApiError> {
    let entries = state
        .registry
        .list_completed()
        .await
        .map_err(|e| ScanError::Store(e.to_string()))?;
    Ok(Json(entries))
}
