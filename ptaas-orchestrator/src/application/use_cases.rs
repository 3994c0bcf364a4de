//! Orchestrator use cases

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use ptaas_core::config::ScannersConfig;

use super::jobs::default_options;
use super::registry::ScanRegistryHandle;
use super::workflow::JobWorkflow;
use crate::domain::entities::{ArtifactObject, ScanRequest};
use crate::domain::errors::ScanError;
use crate::domain::services::ArtifactStore;
use crate::domain::state::JobState;
use crate::domain::value_objects::ScanType;
use crate::infrastructure::job_queue::JobQueue;
use crate::infrastructure::job_store::JobStore;

/// State reported when neither the store nor the registry can answer
pub const UNREACHABLE_STATE: &str = "UNREACHABLE";

/// Validate a submission, publish `QUEUED`, track it and enqueue it.
pub struct SubmitScanUseCase {
    workflow: Arc<JobWorkflow>,
    queue: Arc<dyn JobQueue>,
    registry: ScanRegistryHandle,
    scanners: Arc<ScannersConfig>,
}

impl SubmitScanUseCase {
    pub fn new(
        workflow: Arc<JobWorkflow>,
        queue: Arc<dyn JobQueue>,
        registry: ScanRegistryHandle,
        scanners: Arc<ScannersConfig>,
    ) -> Self {
        Self {
            workflow,
            queue,
            registry,
            scanners,
        }
    }

    pub async fn execute(
        &self,
        scan_type: ScanType,
        target: &str,
        options: Option<&str>,
    ) -> Result<ScanRequest, ScanError> {
        let request = ScanRequest::new(
            scan_type,
            target,
            options,
            default_options(&self.scanners, scan_type),
        )?;

        self.workflow.enqueue(&request).await?;

        if let Err(e) = self.registry.track(request.clone()).await {
            warn!(job_id = %request.job_id, error = %e, "Scan will not appear in the active list");
        }

        if let Err(e) = self.queue.enqueue(&request).await {
            error!(job_id = %request.job_id, error = %e, "Failed to enqueue scan");
            let message = format!("failed to enqueue job: {}", e);
            if let Err(store_err) = self.workflow.fail(&request, &message).await {
                warn!(job_id = %request.job_id, error = %store_err, "Failed to record enqueue failure");
            }
            return Err(ScanError::Queue(e.to_string()));
        }

        info!(
            job_id = %request.job_id,
            scan_type = %request.scan_type,
            target = %request.target,
            "Scan submitted"
        );
        Ok(request)
    }
}

/// Best-effort status of a single job.
pub struct GetScanStatusUseCase {
    job_store: Arc<dyn JobStore>,
    registry: ScanRegistryHandle,
}

impl GetScanStatusUseCase {
    pub fn new(job_store: Arc<dyn JobStore>, registry: ScanRegistryHandle) -> Self {
        Self {
            job_store,
            registry,
        }
    }

    /// Published state, falling back to the registry's last observation when
    /// the store is unreachable or the state has expired.
    pub async fn execute(&self, job_id: Uuid) -> Result<JobState, ScanError> {
        match self.job_store.get_snapshot(job_id).await {
            Ok(Some(snapshot)) => Ok(snapshot.state),
            Ok(None) => self
                .last_known(job_id)
                .await
                .ok_or_else(|| ScanError::NotFound(format!("job {}", job_id))),
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Job store unreachable; using last known state");
                Ok(self.last_known(job_id).await.unwrap_or(JobState::Unknown {
                    raw: UNREACHABLE_STATE.to_string(),
                }))
            }
        }
    }

    async fn last_known(&self, job_id: Uuid) -> Option<JobState> {
        self.registry.last_known(job_id).await.ok().flatten()
    }
}

/// Raw artifact of a completed job
#[derive(Debug, Clone)]
pub struct DownloadedArtifact {
    pub filename: String,
    pub content_type: &'static str,
    pub content: Vec<u8>,
}

/// Raw artifact access: completed-job downloads plus bucket listing.
pub struct ArtifactAccessUseCase {
    registry: ScanRegistryHandle,
    artifacts: Arc<dyn ArtifactStore>,
}

impl ArtifactAccessUseCase {
    pub fn new(registry: ScanRegistryHandle, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            registry,
            artifacts,
        }
    }

    /// Resolve a completed job's artifact pointer and fetch the bytes.
    pub async fn download(&self, job_id: Uuid) -> Result<DownloadedArtifact, ScanError> {
        let entry = self
            .registry
            .completed_entry(job_id)
            .await
            .map_err(|e| ScanError::Store(e.to_string()))?
            .ok_or_else(|| ScanError::NotFound(format!("no completed scan {}", job_id)))?;

        let filename = entry
            .filename
            .ok_or_else(|| ScanError::NotFound(format!("scan {} has no stored artifact", job_id)))?;

        let content = self
            .artifacts
            .get(&filename)
            .await?
            .ok_or_else(|| ScanError::NotFound(format!("artifact {}", filename)))?;

        Ok(DownloadedArtifact {
            content_type: content_type_for(&filename),
            filename,
            content,
        })
    }

    pub async fn list(&self, prefix: Option<&str>) -> Result<Vec<ArtifactObject>, ScanError> {
        self.artifacts.list(prefix).await
    }

    pub async fn delete(&self, key: &str) -> Result<(), ScanError> {
        self.artifacts.delete(key).await?;
        info!(key, "Deleted artifact");
        Ok(())
    }
}

/// Content type derived from an artifact's extension
pub fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit_once('.').map(|(_, ext)| ext) {
        Some("xml") => "application/xml",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
