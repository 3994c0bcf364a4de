//! Injection scan: sqlmap text output, classified and imported as
//! `Generic Findings Import`

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use super::{ScanJobDefinition, exec_tool};
use crate::application::publisher::ResultPublisher;
use crate::application::workflow::JobContext;
use crate::domain::entities::{Finding, ImportRequest, ScanRequest, ScanResult};
use crate::domain::errors::ScanError;
use crate::domain::services::{ContainerRuntime, FindingClassifier};
use crate::domain::value_objects::ScanType;

const OUTPUT_DIR: &str = "--output-dir=/tmp/sqlmap";

pub struct InjectionScanJob {
    runtime: Arc<dyn ContainerRuntime>,
    publisher: Arc<ResultPublisher>,
    classifier: Arc<dyn FindingClassifier>,
    container: String,
}

impl InjectionScanJob {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        publisher: Arc<ResultPublisher>,
        classifier: Arc<dyn FindingClassifier>,
        container: String,
    ) -> Self {
        Self {
            runtime,
            publisher,
            classifier,
            container,
        }
    }

    fn command(request: &ScanRequest) -> Vec<String> {
        let mut command = vec![
            "sqlmap".to_string(),
            "-u".to_string(),
            request.target.clone(),
        ];
        command.extend(request.option_args());
        command.push(OUTPUT_DIR.to_string());
        command
    }

    fn findings_report(findings: &[Finding]) -> Result<Vec<u8>, ScanError> {
        serde_json::to_vec(&serde_json::json!({ "findings": findings }))
            .map_err(|e| ScanError::Storage(format!("Failed to encode findings report: {}", e)))
    }
}

#[async_trait]
impl ScanJobDefinition for InjectionScanJob {
    fn scan_type(&self) -> ScanType {
        ScanType::InjectionScan
    }

    async fn run(&self, ctx: &JobContext, request: &ScanRequest) -> Result<ScanResult, ScanError> {
        ctx.checkpoint(0, "Initializing injection scan").await?;

        ctx.checkpoint(20, &format!("Scanning {}", request.target))
            .await?;
        // sqlmap exits non-zero for unreachable or non-injectable targets;
        // the output is still the evidence we keep.
        let output = exec_tool(
            ctx,
            self.runtime.as_ref(),
            "sqlmap",
            &self.container,
            Self::command(request),
            false,
        )
        .await?;
        if !output.success() {
            warn!(job_id = %ctx.job_id, exit_code = ?output.exit_code, "sqlmap exited with non-zero status");
        }
        let raw = output.combined();

        ctx.checkpoint(60, "Uploading to storage").await?;
        let artifact = self
            .publisher
            .persist(ScanType::InjectionScan, &request.target, raw.clone())
            .await?;

        ctx.checkpoint(70, "Classifying findings").await?;
        let findings = self
            .classifier
            .classify(&String::from_utf8_lossy(&raw), Utc::now().date_naive());

        ctx.checkpoint(80, "Importing to vulnerability management")
            .await?;
        let report = Self::findings_report(&findings)?;
        let report_name = artifact
            .filename
            .trim_end_matches(".txt")
            .to_string()
            + "_findings.json";
        let import = self
            .publisher
            .import(ImportRequest {
                scan_type: "Generic Findings Import".to_string(),
                engagement_name: format!("SQLMap Scan - {}", request.target),
                filename: report_name,
                content_type: "application/json".to_string(),
                content: report,
            })
            .await;

        ctx.checkpoint(100, "Completed").await?;
        info!(
            job_id = %ctx.job_id,
            target = %request.target,
            findings = findings.len(),
            "Injection scan finished"
        );

        Ok(ScanResult::new(request, artifact, import).with_findings(findings))
    }
}
