//! Orchestrator domain services
//!
//! Ports to the external systems a scan touches. Production adapters live in
//! `infrastructure`; tests substitute in-memory doubles.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::entities::{ArtifactObject, Finding, FindingSummary, FindingsQuery, ImportRequest, ImportResult};
use super::errors::ScanError;

/// Captured result of a command run inside a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> Vec<u8> {
        let mut combined = Vec::with_capacity(self.stdout.len() + self.stderr.len());
        combined.extend_from_slice(&self.stdout);
        combined.extend_from_slice(&self.stderr);
        combined
    }
}

/// Runs tool commands inside long-lived scanner containers
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Execute `command` in `container` and wait for it to exit.
    ///
    /// Dropping the returned future must terminate the command.
    async fn exec(&self, container: &str, command: &[String]) -> Result<ExecOutput, ScanError>;
}

/// Control API of the web application scanner
#[async_trait]
pub trait WebScannerApi: Send + Sync {
    async fn access_url(&self, url: &str) -> Result<(), ScanError>;

    /// Start crawling and return the scanner's opaque scan id
    async fn start_crawl(&self, url: &str) -> Result<String, ScanError>;

    /// Crawl completion percentage
    async fn crawl_status(&self, scan_id: &str) -> Result<u8, ScanError>;

    async fn start_active_scan(&self, url: &str) -> Result<String, ScanError>;

    async fn active_scan_status(&self, scan_id: &str) -> Result<u8, ScanError>;

    /// Full JSON report of everything the scanner has observed
    async fn json_report(&self) -> Result<Vec<u8>, ScanError>;
}

/// S3-compatible object storage for raw artifacts
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store an object and return its addressable URL
    async fn put(&self, key: &str, content: Vec<u8>, content_type: &str) -> Result<String, ScanError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ScanError>;

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ArtifactObject>, ScanError>;

    async fn delete(&self, key: &str) -> Result<(), ScanError>;
}

/// Vulnerability management system (DefectDojo)
///
/// Imports never fail the caller: errors come back as [`ImportResult::Failed`].
/// Reads swallow errors into empty results.
#[async_trait]
pub trait VulnerabilityManagement: Send + Sync {
    async fn import_scan(&self, request: ImportRequest) -> ImportResult;

    async fn findings(&self, query: &FindingsQuery) -> Vec<FindingSummary>;

    async fn finding(&self, id: i64) -> Option<FindingSummary>;

    async fn products(&self) -> Vec<serde_json::Value>;

    async fn engagements(&self, product_id: Option<i64>) -> Vec<serde_json::Value>;

    async fn tests(&self, engagement_id: Option<i64>) -> Vec<serde_json::Value>;
}

/// Turns raw injection-scanner output into findings
pub trait FindingClassifier: Send + Sync {
    fn classify(&self, output: &str, date: NaiveDate) -> Vec<Finding>;
}

/// Timer driving poll loops and settle delays
#[async_trait]
pub trait Ticker: Send + Sync {
    async fn tick(&self, interval: Duration);
}

/// Real-time ticker
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTicker;

#[async_trait]
impl Ticker for TokioTicker {
    async fn tick(&self, interval: Duration) {
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_output_combined() {
        let output = ExecOutput {
            exit_code: Some(0),
            stdout: b"out ".to_vec(),
            stderr: b"err".to_vec(),
        };
        assert!(output.success());
        assert_eq!(output.combined(), b"out err".to_vec());
        assert!(!ExecOutput::default().success());
    }
}
