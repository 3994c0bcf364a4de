//! API request and response models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::entities::{ScanRequest, ScanResult};
use crate::domain::state::JobState;
use crate::domain::value_objects::ScanType;

/// Body of `POST /scans/{scan_type}`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ScanSubmission {
    /// Host, IP or URL to scan
    #[schema(example = "10.0.0.5")]
    pub target: String,

    /// Tool arguments; for web scans the mode (`active` or `passive`)
    #[schema(example = "-sV -sC")]
    #[serde(default)]
    pub options: Option<String>,
}

/// Returned once a scan has been queued
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScanAcceptedResponse {
    pub job_id: Uuid,
    pub scan_type: ScanType,
    pub target: String,
    #[schema(example = "queued")]
    pub status: String,
    pub message: String,
}

impl From<&ScanRequest> for ScanAcceptedResponse {
    fn from(request: &ScanRequest) -> Self {
        Self {
            job_id: request.job_id,
            scan_type: request.scan_type,
            target: request.target.clone(),
            status: "queued".to_string(),
            message: format!("{} scan queued for {}", request.scan_type.tool(), request.target),
        }
    }
}

/// Best-effort status of a scan job
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScanStatusResponse {
    pub job_id: Uuid,
    /// `QUEUED`, `STARTED`, `SUCCESS`, `FAILURE` or an unrecognized name
    #[schema(example = "STARTED")]
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ScanResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanStatusResponse {
    pub fn from_state(job_id: Uuid, state: &JobState) -> Self {
        let (result, error) = match state {
            JobState::Success { result } => (Some(result.as_ref().clone()), None),
            JobState::Failure { error } => (None, Some(error.clone())),
            _ => (None, None),
        };

        Self {
            job_id,
            state: state.label().to_string(),
            status: state.status_text(),
            progress: state.progress(),
            result,
            error,
        }
    }
}

/// Query for `GET /findings`
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FindingsParams {
    /// Product name
    pub product: Option<String>,
    /// Critical, High, Medium, Low or Info
    pub severity: Option<String>,
    pub active: Option<bool>,
    #[serde(default = "default_findings_limit")]
    pub limit: u32,
}

fn default_findings_limit() -> u32 {
    100
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EngagementParams {
    pub product_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TestParams {
    pub engagement_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ArtifactListParams {
    /// Key prefix, e.g. `networkscan_`
    pub prefix: Option<String>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code
    #[schema(example = "VALIDATION_ERROR")]
    pub code: String,

    /// Human-readable error message
    #[schema(example = "Invalid scan request: target must not be empty")]
    pub message: String,

    /// Additional error context
    pub details: Option<serde_json::Value>,

    /// Unique request identifier for tracking and support
    pub request_id: Uuid,

    /// Error timestamp
    pub timestamp: DateTime<Utc>,
}

/// Where the orchestrator's dependencies live
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DependencyConfiguration {
    #[schema(example = "redis")]
    pub queue_backend: String,
    pub defectdojo_url: String,
    pub defectdojo_configured: bool,
    pub storage_endpoint: Option<String>,
    pub storage_bucket: String,
    pub web_scanner_url: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when the broker is unreachable
    #[schema(example = "healthy")]
    pub status: String,

    #[schema(example = "0.1.0")]
    pub version: String,

    pub timestamp: DateTime<Utc>,

    pub broker_reachable: bool,

    /// Jobs waiting in the queue, when the broker answered
    pub queue_depth: Option<u64>,

    pub dependencies: DependencyConfiguration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ImportResult;

    #[test]
    fn test_status_response_for_running_job() {
        let id = Uuid::new_v4();
        let response = ScanStatusResponse::from_state(id, &JobState::started(60, "Uploading"));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["state"], "STARTED");
        assert_eq!(json["progress"], 60);
        assert_eq!(json["status"], "Uploading");
        assert!(json.get("result").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_status_response_for_failed_job() {
        let response = ScanStatusResponse::from_state(
            Uuid::new_v4(),
            &JobState::Failure {
                error: "nmap exited with code 1".to_string(),
            },
        );

        assert_eq!(response.state, "FAILURE");
        assert_eq!(response.error.as_deref(), Some("nmap exited with code 1"));
        assert_eq!(response.progress, None);
    }

    #[test]
    fn test_status_response_carries_result() {
        let result = ScanResult {
            status: "success".to_string(),
            scan_type: ScanType::NetworkScan,
            target: "10.0.0.5".to_string(),
            mode: None,
            storage_url: "http://minio:9000/ptaas/a.xml".to_string(),
            filename: "a.xml".to_string(),
            import: ImportResult::failed("down", Some(502)),
            findings: Vec::new(),
        };
        let response = ScanStatusResponse::from_state(
            Uuid::new_v4(),
            &JobState::Success {
                result: Box::new(result.clone()),
            },
        );

        assert_eq!(response.progress, Some(100));
        assert_eq!(response.result, Some(result));
    }

    #[test]
    fn test_findings_limit_defaults() {
        let params: FindingsParams = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(params.limit, 100);
        assert!(params.product.is_none());
    }
}
