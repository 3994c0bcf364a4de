//! Scan error taxonomy

/// Errors raised while validating, executing or publishing a scan.
///
/// Any of these aborting a job phase turns the job into a `Failure` carrying
/// the rendered message. Nothing is retried.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScanError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{tool} is unavailable: {message}")]
    ToolUnavailable { tool: String, message: String },

    #[error("{tool} exited with {}: {output}", exit_label(.exit_code))]
    ToolExecution {
        tool: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("{service} API error{}: {message}", status_label(.status))]
    UpstreamApi {
        service: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{phase} did not complete within {polls} polls")]
    Timeout { phase: String, polls: u32 },

    /// Rendered verbatim, e.g. `soft time limit exceeded`
    #[error("{0}")]
    Cancelled(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Job queue error: {0}")]
    Queue(String),

    #[error("Job store error: {0}")]
    Store(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "no status".to_string(),
    }
}

fn status_label(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl ScanError {
    pub fn unavailable(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolUnavailable {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn upstream(service: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::UpstreamApi {
            service: service.into(),
            status,
            message: message.into(),
        }
    }

    pub fn soft_time_limit() -> Self {
        Self::Cancelled("soft time limit exceeded".to_string())
    }

    /// Stable machine-readable code used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ToolUnavailable { .. } => "TOOL_UNAVAILABLE",
            Self::ToolExecution { .. } => "TOOL_EXECUTION_FAILED",
            Self::UpstreamApi { .. } => "UPSTREAM_API_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Cancelled(_) => "CANCELLED",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Queue(_) => "QUEUE_ERROR",
            Self::Store(_) => "JOB_STORE_ERROR",
        }
    }
}
