//! Scan job definitions
//!
//! Each scan type is a multi-phase job implementing [`ScanJobDefinition`].
//! Phase boundaries call [`JobContext::checkpoint`], which publishes progress
//! and aborts once the soft time limit has fired.

mod injection;
mod network;
mod web;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use ptaas_core::config::ScannersConfig;

pub use injection::InjectionScanJob;
pub use network::NetworkScanJob;
pub use web::{WebScanJob, WebScanTiming};

use super::publisher::ResultPublisher;
use super::workflow::JobContext;
use crate::domain::entities::{ScanRequest, ScanResult};
use crate::domain::errors::ScanError;
use crate::domain::services::{ContainerRuntime, FindingClassifier, WebScannerApi};
use crate::domain::value_objects::ScanType;

/// A runnable scan job
#[async_trait]
pub trait ScanJobDefinition: Send + Sync {
    fn scan_type(&self) -> ScanType;

    async fn run(&self, ctx: &JobContext, request: &ScanRequest) -> Result<ScanResult, ScanError>;
}

/// Clients a worker needs to run any scan type.
///
/// Built fresh every time a worker (re)starts.
#[derive(Clone)]
pub struct ScanToolkit {
    pub runtime: Arc<dyn ContainerRuntime>,
    pub web_scanner: Arc<dyn WebScannerApi>,
    pub publisher: Arc<ResultPublisher>,
    pub classifier: Arc<dyn FindingClassifier>,
    pub scanners: Arc<ScannersConfig>,
}

impl ScanToolkit {
    pub fn definition(&self, scan_type: ScanType) -> Box<dyn ScanJobDefinition> {
        match scan_type {
            ScanType::NetworkScan => Box::new(NetworkScanJob::new(
                self.runtime.clone(),
                self.publisher.clone(),
                self.scanners.network.container.clone(),
            )),
            ScanType::WebScan => {
                let web = &self.scanners.web;
                Box::new(WebScanJob::new(
                    self.web_scanner.clone(),
                    self.publisher.clone(),
                    WebScanTiming {
                        settle: Duration::from_millis(web.access_settle_ms),
                        crawl_interval: Duration::from_millis(web.crawl_poll_interval_ms),
                        crawl_max_polls: web.crawl_max_polls,
                        active_interval: Duration::from_millis(web.active_poll_interval_ms),
                        active_max_polls: web.active_max_polls,
                    },
                ))
            }
            ScanType::InjectionScan => Box::new(InjectionScanJob::new(
                self.runtime.clone(),
                self.publisher.clone(),
                self.classifier.clone(),
                self.scanners.injection.container.clone(),
            )),
        }
    }
}

/// Builds a fresh [`ScanToolkit`] for each worker generation
#[async_trait]
pub trait ToolkitFactory: Send + Sync {
    async fn build(&self) -> Result<ScanToolkit, ScanError>;
}

/// Default options applied when a submission leaves them blank
pub fn default_options(scanners: &ScannersConfig, scan_type: ScanType) -> &str {
    match scan_type {
        ScanType::NetworkScan => &scanners.network.default_options,
        ScanType::WebScan => &scanners.web.default_mode,
        ScanType::InjectionScan => &scanners.injection.default_options,
    }
}

/// Run a tool in its container, surfacing a non-zero exit as an execution error
/// when `require_success` is set.
async fn exec_tool(
    ctx: &JobContext,
    runtime: &dyn ContainerRuntime,
    tool: &str,
    container: &str,
    command: Vec<String>,
    require_success: bool,
) -> Result<crate::domain::services::ExecOutput, ScanError> {
    tracing::debug!(job_id = %ctx.job_id, tool, container, ?command, "Executing scanner command");

    let output = ctx.interruptible(runtime.exec(container, &command)).await?;

    if require_success && !output.success() {
        return Err(ScanError::ToolExecution {
            tool: tool.to_string(),
            exit_code: output.exit_code,
            output: String::from_utf8_lossy(&output.combined()).trim().to_string(),
        });
    }

    Ok(output)
}
