//! Job state protocol
//!
//! Every job publishes its state as a `{"state": NAME, "meta": {...}}` pair.
//! Writers only ever produce the four well-known names; readers tolerate
//! anything else by surfacing it as [`JobState::Unknown`].
//!
//! ```text
//! QUEUED ──► STARTED ──► STARTED ... ──► SUCCESS
//!                                   └──► FAILURE
//! ```

use serde::{Deserialize, Serialize};

use super::entities::ScanResult;

pub const QUEUED: &str = "QUEUED";
pub const STARTED: &str = "STARTED";
pub const SUCCESS: &str = "SUCCESS";
pub const FAILURE: &str = "FAILURE";

/// Observed state of a scan job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawJobState", into = "RawJobState")]
pub enum JobState {
    Queued,
    Started { progress: u8, status: String },
    Success { result: Box<ScanResult> },
    Failure { error: String },
    /// A state name this build does not recognize, kept verbatim
    Unknown { raw: String },
}

impl JobState {
    pub fn started(progress: u8, status: impl Into<String>) -> Self {
        Self::Started {
            progress: progress.min(100),
            status: status.into(),
        }
    }

    /// Wire name of the state
    pub fn label(&self) -> &str {
        match self {
            Self::Queued => QUEUED,
            Self::Started { .. } => STARTED,
            Self::Success { .. } => SUCCESS,
            Self::Failure { .. } => FAILURE,
            Self::Unknown { raw } => raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Failure { .. })
    }

    pub fn progress(&self) -> Option<u8> {
        match self {
            Self::Queued => Some(0),
            Self::Started { progress, .. } => Some(*progress),
            Self::Success { .. } => Some(100),
            Self::Failure { .. } | Self::Unknown { .. } => None,
        }
    }

    pub fn status_text(&self) -> Option<String> {
        match self {
            Self::Queued => Some("Queued".to_string()),
            Self::Started { status, .. } => Some(status.clone()),
            Self::Success { .. } => Some("Completed".to_string()),
            Self::Failure { error } => Some(format!("Failed: {}", error)),
            Self::Unknown { .. } => None,
        }
    }
}

/// Wire representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawJobState {
    pub state: String,
    #[serde(default)]
    pub meta: serde_json::Value,
}

#[derive(Deserialize)]
struct StartedMeta {
    progress: u8,
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct SuccessMeta {
    result: Box<ScanResult>,
}

#[derive(Deserialize)]
struct FailureMeta {
    error: String,
}

impl From<RawJobState> for JobState {
    fn from(raw: RawJobState) -> Self {
        let unknown = || JobState::Unknown {
            raw: raw.state.clone(),
        };

        match raw.state.as_str() {
            QUEUED => JobState::Queued,
            STARTED => serde_json::from_value::<StartedMeta>(raw.meta.clone())
                .map(|meta| JobState::started(meta.progress, meta.status))
                .unwrap_or_else(|_| unknown()),
            SUCCESS => serde_json::from_value::<SuccessMeta>(raw.meta.clone())
                .map(|meta| JobState::Success {
                    result: meta.result,
                })
                .unwrap_or_else(|_| unknown()),
            FAILURE => serde_json::from_value::<FailureMeta>(raw.meta.clone())
                .map(|meta| JobState::Failure { error: meta.error })
                .unwrap_or_else(|_| unknown()),
            _ => unknown(),
        }
    }
}

impl From<JobState> for RawJobState {
    fn from(state: JobState) -> Self {
        let label = state.label().to_string();
        let meta = match state {
            JobState::Queued | JobState::Unknown { .. } => serde_json::json!({}),
            JobState::Started { progress, status } => {
                serde_json::json!({ "progress": progress, "status": status })
            }
            JobState::Success { result } => {
                serde_json::json!({ "result": serde_json::to_value(&result).unwrap_or_default() })
            }
            JobState::Failure { error } => serde_json::json!({ "error": error }),
        };

        RawJobState { state: label, meta }
    }
}
