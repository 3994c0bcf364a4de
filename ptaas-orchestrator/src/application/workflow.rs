//! Job workflow: publishes every state a scan job passes through.
//!
//! All writes go through [`JobWorkflow`], which replaces the job's state
//! document in one store operation. Workers drive it via a
//! [`ProgressReporter`] wrapped in a [`JobContext`].
//!
//! ```text
//! SubmitScan          JobWorkflow          JobStore       JobQueue
//!     │                   │                   │              │
//!     ├─ enqueue() ──────►│── save QUEUED ───►│              │
//!     ├─ queue.enqueue() ─┼───────────────────┼─────────────►│
//!     │                   │                   │              │
//!     │  (worker pops)    │                   │              │
//!     ├─ checkpoint() ───►│── save STARTED ──►│              │
//!     ├─ succeed() ──────►│── save SUCCESS ──►│              │
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::entities::{ScanRequest, ScanResult};
use crate::domain::errors::ScanError;
use crate::domain::services::Ticker;
use crate::domain::state::JobState;
use crate::infrastructure::job_store::{JobSnapshot, JobStore, JobStoreError};

/// Job lifecycle publisher.
#[derive(Clone)]
pub struct JobWorkflow {
    job_store: Arc<dyn JobStore>,
}

impl JobWorkflow {
    pub fn new(job_store: Arc<dyn JobStore>) -> Self {
        Self { job_store }
    }

    // ── Transition helpers ───────────────────────────────────────────

    /// Publish the initial `QUEUED` state.
    pub async fn enqueue(&self, request: &ScanRequest) -> Result<(), JobStoreError> {
        self.publish(request, JobState::Queued).await?;
        info!(job_id = %request.job_id, scan_type = %request.scan_type, "Job queued");
        Ok(())
    }

    /// Publish a `STARTED` progress update.
    pub async fn progress(
        &self,
        request: &ScanRequest,
        progress: u8,
        status: &str,
    ) -> Result<(), JobStoreError> {
        self.publish(request, JobState::started(progress, status))
            .await
    }

    /// Publish the terminal `SUCCESS` state.
    pub async fn succeed(
        &self,
        request: &ScanRequest,
        result: ScanResult,
    ) -> Result<(), JobStoreError> {
        self.publish(
            request,
            JobState::Success {
                result: Box::new(result),
            },
        )
        .await?;

        info!(job_id = %request.job_id, "Job transitioned to SUCCESS");
        Ok(())
    }

    /// Publish the terminal `FAILURE` state.
    pub async fn fail(&self, request: &ScanRequest, error: &str) -> Result<(), JobStoreError> {
        self.publish(
            request,
            JobState::Failure {
                error: error.to_string(),
            },
        )
        .await?;

        warn!(job_id = %request.job_id, error, "Job transitioned to FAILURE");
        Ok(())
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Option<JobSnapshot>, JobStoreError> {
        self.job_store.get_snapshot(job_id).await
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn publish(&self, request: &ScanRequest, state: JobState) -> Result<(), JobStoreError> {
        self.job_store
            .save_snapshot(JobSnapshot::new(request, state))
            .await
    }
}

/// Publishes monotonic progress for one running job.
///
/// Values are clamped to 0–100 and never drop below the last published value.
pub struct ProgressReporter {
    workflow: JobWorkflow,
    request: ScanRequest,
    last: Mutex<Option<u8>>,
}

impl ProgressReporter {
    pub fn new(workflow: JobWorkflow, request: ScanRequest) -> Self {
        Self {
            workflow,
            request,
            last: Mutex::new(None),
        }
    }

    /// Publish `STARTED{progress,status}` and return the value actually published.
    ///
    /// Store failures are logged; a running scan is not aborted because a
    /// poller cannot see its progress.
    pub async fn report(&self, progress: u8, status: &str) -> u8 {
        let mut last = self.last.lock().await;
        let progress = progress.min(100).max(last.unwrap_or(0));
        *last = Some(progress);

        if let Err(e) = self.workflow.progress(&self.request, progress, status).await {
            warn!(
                job_id = %self.request.job_id,
                progress,
                error = %e,
                "Failed to publish job progress"
            );
        }

        progress
    }

    pub async fn last_published(&self) -> Option<u8> {
        *self.last.lock().await
    }
}

/// Everything a job definition needs from the executor
pub struct JobContext {
    pub job_id: Uuid,
    reporter: ProgressReporter,
    cancel: CancellationToken,
    ticker: Arc<dyn Ticker>,
}

impl JobContext {
    pub fn new(
        reporter: ProgressReporter,
        cancel: CancellationToken,
        ticker: Arc<dyn Ticker>,
    ) -> Self {
        Self {
            job_id: reporter.request.job_id,
            reporter,
            cancel,
            ticker,
        }
    }

    /// Phase boundary: abort if the soft limit fired, otherwise publish progress.
    pub async fn checkpoint(&self, progress: u8, status: &str) -> Result<u8, ScanError> {
        self.ensure_active()?;
        Ok(self.reporter.report(progress, status).await)
    }

    pub fn ensure_active(&self) -> Result<(), ScanError> {
        if self.cancel.is_cancelled() {
            return Err(ScanError::soft_time_limit());
        }
        Ok(())
    }

    /// Wait for `interval`, returning early with an error if cancelled.
    pub async fn sleep(&self, interval: Duration) -> Result<(), ScanError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ScanError::soft_time_limit()),
            _ = self.ticker.tick(interval) => Ok(()),
        }
    }

    /// Run an external call, abandoning it if the soft limit fires.
    pub async fn interruptible<T, F>(&self, call: F) -> Result<T, ScanError>
    where
        F: std::future::Future<Output = Result<T, ScanError>>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ScanError::soft_time_limit()),
            result = call => result,
        }
    }

    pub fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }
}
