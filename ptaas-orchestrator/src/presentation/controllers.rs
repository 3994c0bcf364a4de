//! Orchestrator API controllers

pub mod dojo;
pub mod health;
pub mod results;
pub mod scans;

use std::sync::Arc;

use crate::application::registry::ScanRegistryHandle;
use crate::application::use_cases::{ArtifactAccessUseCase, GetScanStatusUseCase, SubmitScanUseCase};
use crate::domain::services::VulnerabilityManagement;
use crate::infrastructure::job_queue::JobQueue;
use crate::presentation::models::DependencyConfiguration;

/// Application state for orchestrator
#[derive(Clone)]
pub struct OrchestratorState {
    pub submit_scan_use_case: Arc<SubmitScanUseCase>,
    pub scan_status_use_case: Arc<GetScanStatusUseCase>,
    pub artifact_use_case: Arc<ArtifactAccessUseCase>,
    pub registry: ScanRegistryHandle,
    pub vulnerability_management: Arc<dyn VulnerabilityManagement>,
    pub queue: Arc<dyn JobQueue>,
    pub dependencies: Arc<DependencyConfiguration>,
}
