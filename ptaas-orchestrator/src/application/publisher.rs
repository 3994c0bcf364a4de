//! Result publication: raw artifact storage and vulnerability-manager import
//!
//! The two side effects are independent. A failed import after a successful
//! upload yields a degraded [`ImportResult::Failed`], never an error.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::entities::{ImportRequest, ImportResult, StoredArtifact};
use crate::domain::errors::ScanError;
use crate::domain::services::{ArtifactStore, VulnerabilityManagement};
use crate::domain::value_objects::ScanType;

/// Deterministic artifact key: `{prefix}_{target}_{unix seconds}.{ext}`
pub fn artifact_filename(scan_type: ScanType, target: &str, unix_seconds: i64) -> String {
    format!(
        "{}_{}_{}.{}",
        scan_type.artifact_prefix(),
        normalize_target(target),
        unix_seconds,
        scan_type.artifact_extension()
    )
}

fn normalize_target(target: &str) -> String {
    target.replace("://", "_").replace('/', "_")
}

pub struct ResultPublisher {
    artifacts: Arc<dyn ArtifactStore>,
    vulnerability_management: Arc<dyn VulnerabilityManagement>,
}

impl ResultPublisher {
    pub fn new(
        artifacts: Arc<dyn ArtifactStore>,
        vulnerability_management: Arc<dyn VulnerabilityManagement>,
    ) -> Self {
        Self {
            artifacts,
            vulnerability_management,
        }
    }

    /// Upload raw tool output under its deterministic key.
    pub async fn persist(
        &self,
        scan_type: ScanType,
        target: &str,
        content: Vec<u8>,
    ) -> Result<StoredArtifact, ScanError> {
        let filename = artifact_filename(scan_type, target, Utc::now().timestamp());
        let size = content.len();
        let url = self
            .artifacts
            .put(&filename, content, scan_type.content_type())
            .await?;

        info!(filename = %filename, size, "Stored raw scan artifact");
        Ok(StoredArtifact { url, filename })
    }

    /// Submit a report for import.
    pub async fn import(&self, request: ImportRequest) -> ImportResult {
        let engagement = request.engagement_name.clone();
        let result = self.vulnerability_management.import_scan(request).await;

        match &result {
            ImportResult::Imported { test_id, .. } => {
                info!(engagement = %engagement, test_id = ?test_id, "Imported scan results");
            }
            ImportResult::Failed { error, status_code } => {
                warn!(
                    engagement = %engagement,
                    status_code = ?status_code,
                    error = %error,
                    "Scan import failed; keeping stored artifact"
                );
            }
        }

        result
    }
}
