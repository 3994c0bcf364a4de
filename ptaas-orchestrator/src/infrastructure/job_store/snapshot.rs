use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::ScanRequest;
use crate::domain::state::JobState;
use crate::domain::value_objects::ScanType;

/// Published state of a job, stored as one document per job id.
///
/// The state is flattened so the document carries the protocol's
/// `state` / `meta` pair at the top level next to the job descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub scan_type: ScanType,
    pub target: String,
    #[serde(flatten)]
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobSnapshot {
    pub fn new(request: &ScanRequest, state: JobState) -> Self {
        Self {
            job_id: request.job_id,
            scan_type: request.scan_type,
            target: request.target.clone(),
            state,
            created_at: request.created_at,
            updated_at: Utc::now(),
        }
    }
}
