//! Orchestrator domain entities

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::errors::ScanError;
use super::state::JobState;
use super::value_objects::{ScanMode, ScanType, Severity};

const MAX_TARGET_LEN: usize = 2048;

/// A validated scan submission; this is the payload carried on the job queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub job_id: Uuid,
    pub scan_type: ScanType,
    pub target: String,
    /// Tool options; the per-type default has already been applied
    pub options: String,
    pub created_at: DateTime<Utc>,
}

impl ScanRequest {
    /// Validate a submission and assign a fresh job id.
    ///
    /// Targets are trimmed and must be a single non-empty token that cannot be
    /// mistaken for a tool flag. Blank options fall back to `default_options`.
    pub fn new(
        scan_type: ScanType,
        target: &str,
        options: Option<&str>,
        default_options: &str,
    ) -> Result<Self, ScanError> {
        let target = target.trim();

        if target.is_empty() {
            return Err(ScanError::Validation("target must not be empty".to_string()));
        }
        if target.len() > MAX_TARGET_LEN {
            return Err(ScanError::Validation(format!(
                "target exceeds {} characters",
                MAX_TARGET_LEN
            )));
        }
        if target.chars().any(char::is_whitespace) {
            return Err(ScanError::Validation(
                "target must not contain whitespace".to_string(),
            ));
        }
        if target.starts_with('-') {
            return Err(ScanError::Validation(
                "target must not start with '-'".to_string(),
            ));
        }

        let options = match options.map(str::trim) {
            Some(opts) if !opts.is_empty() => opts.to_string(),
            _ => default_options.trim().to_string(),
        };

        if scan_type == ScanType::WebScan {
            ScanMode::parse(&options)?;
        }

        Ok(Self {
            job_id: Uuid::new_v4(),
            scan_type,
            target: target.to_string(),
            options,
            created_at: Utc::now(),
        })
    }

    /// Options split into individual arguments; no shell is involved.
    pub fn option_args(&self) -> Vec<String> {
        self.options.split_whitespace().map(str::to_string).collect()
    }
}

/// Outcome of submitting a report to the vulnerability manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ImportResult {
    Imported {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        product_id: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        engagement_id: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        test_id: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scan_type: Option<String>,
    },
    Failed {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },
}

impl ImportResult {
    pub fn failed(error: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Failed {
            error: error.into(),
            status_code,
        }
    }

    pub fn is_imported(&self) -> bool {
        matches!(self, Self::Imported { .. })
    }
}

/// A finding synthesized from raw tool output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Finding {
    pub title: String,
    pub severity: Severity,
    pub description: String,
    #[schema(value_type = String, example = "2024-01-15")]
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

/// Result payload of a successful scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScanResult {
    /// Always `success`
    pub status: String,
    pub scan_type: ScanType,
    pub target: String,
    /// Web scans only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ScanMode>,
    pub storage_url: String,
    pub filename: String,
    pub import: ImportResult,
    /// Injection scans only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
}

impl ScanResult {
    pub fn new(request: &ScanRequest, artifact: StoredArtifact, import: ImportResult) -> Self {
        Self {
            status: "success".to_string(),
            scan_type: request.scan_type,
            target: request.target.clone(),
            mode: None,
            storage_url: artifact.url,
            filename: artifact.filename,
            import,
            findings: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_findings(mut self, findings: Vec<Finding>) -> Self {
        self.findings = findings;
        self
    }
}

/// Pointer to a persisted raw artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub url: String,
    pub filename: String,
}

/// Listing entry from the object store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ArtifactObject {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Report handed to the vulnerability manager's import endpoint
#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// Parser name on the vulnerability manager side, e.g. `Nmap Scan`
    pub scan_type: String,
    pub engagement_name: String,
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Live view of a job the API has submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActiveScanRecord {
    pub job_id: Uuid,
    pub scan_type: ScanType,
    pub target: String,
    /// Wire state name (`QUEUED`, `STARTED`, ...)
    pub state: String,
    pub progress: u8,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActiveScanRecord {
    pub fn queued(request: &ScanRequest) -> Self {
        Self {
            job_id: request.job_id,
            scan_type: request.scan_type,
            target: request.target.clone(),
            state: JobState::Queued.label().to_string(),
            progress: 0,
            status: "Queued".to_string(),
            created_at: request.created_at,
            updated_at: request.created_at,
        }
    }

    /// Fold an observed state into the record.
    ///
    /// Progress only moves forward; states without a progress value keep the
    /// last one seen.
    pub fn observe(&mut self, state: &JobState, observed_at: DateTime<Utc>) {
        self.state = state.label().to_string();
        if let Some(progress) = state.progress() {
            self.progress = self.progress.max(progress);
        }
        if let Some(status) = state.status_text() {
            self.status = status;
        }
        self.updated_at = observed_at;
    }
}

/// Summary of a finished job, recorded once per job id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CompletedLogEntry {
    pub job_id: Uuid,
    pub scan_type: ScanType,
    pub target: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub storage_url: Option<String>,
    pub filename: Option<String>,
    pub product_id: Option<i64>,
    pub engagement_id: Option<i64>,
    pub test_id: Option<i64>,
    pub error: Option<String>,
}

impl CompletedLogEntry {
    pub fn from_terminal(record: &ActiveScanRecord, state: &JobState, finished_at: DateTime<Utc>) -> Self {
        let mut entry = Self {
            job_id: record.job_id,
            scan_type: record.scan_type,
            target: record.target.clone(),
            state: state.label().to_string(),
            created_at: record.created_at,
            finished_at,
            storage_url: None,
            filename: None,
            product_id: None,
            engagement_id: None,
            test_id: None,
            error: None,
        };

        match state {
            JobState::Success { result } => {
                entry.storage_url = Some(result.storage_url.clone());
                entry.filename = Some(result.filename.clone());
                match &result.import {
                    ImportResult::Imported {
                        product_id,
                        engagement_id,
                        test_id,
                        ..
                    } => {
                        entry.product_id = *product_id;
                        entry.engagement_id = *engagement_id;
                        entry.test_id = *test_id;
                    }
                    ImportResult::Failed { error, .. } => {
                        entry.error = Some(format!("import failed: {}", error));
                    }
                }
            }
            JobState::Failure { error } => entry.error = Some(error.clone()),
            _ => {}
        }

        entry
    }
}

/// Finding as listed by the vulnerability manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FindingSummary {
    pub id: i64,
    pub title: String,
    pub severity: String,
    pub description: Option<String>,
    pub mitigation: Option<String>,
    pub impact: Option<String>,
    pub references: Option<String>,
    pub cve: Option<String>,
    pub cvss_score: Option<f64>,
    pub found_by: Vec<i64>,
    pub url: Option<String>,
    pub date: Option<String>,
    pub active: bool,
    pub verified: bool,
}

/// Filters for listing findings
#[derive(Debug, Clone, Default)]
pub struct FindingsQuery {
    /// Product name, resolved to an id before querying
    pub product: Option<String>,
    pub severity: Option<String>,
    pub active: Option<bool>,
    pub limit: u32,
}
