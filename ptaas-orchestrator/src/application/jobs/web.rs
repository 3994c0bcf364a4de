//! Web scan: ZAP crawl plus optional active probe, JSON report imported as `ZAP Scan`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::ScanJobDefinition;
use crate::application::poller::{PollPhase, ProgressBand, poll_until_complete};
use crate::application::publisher::ResultPublisher;
use crate::application::workflow::JobContext;
use crate::domain::entities::{ImportRequest, ScanRequest, ScanResult};
use crate::domain::errors::ScanError;
use crate::domain::services::WebScannerApi;
use crate::domain::value_objects::{ScanMode, ScanType};

const CRAWL_BAND: ProgressBand = ProgressBand::new(20, 30);
const ACTIVE_BAND: ProgressBand = ProgressBand::new(50, 30);

/// Waits and poll limits for the web scan sub-phases
#[derive(Debug, Clone)]
pub struct WebScanTiming {
    /// Pause after the first access so the scanner registers the site
    pub settle: Duration,
    pub crawl_interval: Duration,
    pub crawl_max_polls: u32,
    pub active_interval: Duration,
    pub active_max_polls: u32,
}

pub struct WebScanJob {
    scanner: Arc<dyn WebScannerApi>,
    publisher: Arc<ResultPublisher>,
    timing: WebScanTiming,
}

impl WebScanJob {
    pub fn new(
        scanner: Arc<dyn WebScannerApi>,
        publisher: Arc<ResultPublisher>,
        timing: WebScanTiming,
    ) -> Self {
        Self {
            scanner,
            publisher,
            timing,
        }
    }
}

#[async_trait]
impl ScanJobDefinition for WebScanJob {
    fn scan_type(&self) -> ScanType {
        ScanType::WebScan
    }

    async fn run(&self, ctx: &JobContext, request: &ScanRequest) -> Result<ScanResult, ScanError> {
        let mode = ScanMode::parse(&request.options)?;
        let target = request.target.as_str();

        ctx.checkpoint(0, &format!("Initializing {} web scan", mode))
            .await?;

        ctx.checkpoint(10, &format!("Accessing {}", target)).await?;
        ctx.interruptible(self.scanner.access_url(target)).await?;
        ctx.sleep(self.timing.settle).await?;

        // ── Crawl ────────────────────────────────────────────────────
        ctx.checkpoint(CRAWL_BAND.start, "Starting crawl").await?;
        let crawl_id = ctx.interruptible(self.scanner.start_crawl(target)).await?;
        let crawl = PollPhase {
            label: "Crawl",
            band: CRAWL_BAND,
            interval: self.timing.crawl_interval,
            max_polls: self.timing.crawl_max_polls,
        };
        poll_until_complete(ctx, &crawl, || self.scanner.crawl_status(&crawl_id)).await?;

        // ── Active probe ─────────────────────────────────────────────
        if mode == ScanMode::Active {
            ctx.checkpoint(ACTIVE_BAND.start, "Starting active scan")
                .await?;
            let scan_id = ctx
                .interruptible(self.scanner.start_active_scan(target))
                .await?;
            let probe = PollPhase {
                label: "Active scan",
                band: ACTIVE_BAND,
                interval: self.timing.active_interval,
                max_polls: self.timing.active_max_polls,
            };
            poll_until_complete(ctx, &probe, || self.scanner.active_scan_status(&scan_id))
                .await?;
        }

        ctx.checkpoint(80, "Generating report").await?;
        let report = ctx.interruptible(self.scanner.json_report()).await?;

        ctx.checkpoint(85, "Uploading to storage").await?;
        let artifact = self
            .publisher
            .persist(ScanType::WebScan, target, report.clone())
            .await?;

        ctx.checkpoint(90, "Importing to vulnerability management")
            .await?;
        let import = self
            .publisher
            .import(ImportRequest {
                scan_type: "ZAP Scan".to_string(),
                engagement_name: format!("ZAP {} Scan - {}", mode.title(), target),
                filename: artifact.filename.clone(),
                content_type: ScanType::WebScan.content_type().to_string(),
                content: report,
            })
            .await;

        ctx.checkpoint(100, "Completed").await?;
        info!(job_id = %ctx.job_id, target, %mode, "Web scan finished");

        Ok(ScanResult::new(request, artifact, import).with_mode(mode))
    }
}
