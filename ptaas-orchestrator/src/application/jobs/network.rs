//! Network scan: nmap XML output imported as `Nmap Scan`

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{ScanJobDefinition, exec_tool};
use crate::application::publisher::ResultPublisher;
use crate::application::workflow::JobContext;
use crate::domain::entities::{ImportRequest, ScanRequest, ScanResult};
use crate::domain::errors::ScanError;
use crate::domain::services::ContainerRuntime;
use crate::domain::value_objects::ScanType;

pub struct NetworkScanJob {
    runtime: Arc<dyn ContainerRuntime>,
    publisher: Arc<ResultPublisher>,
    container: String,
}

impl NetworkScanJob {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        publisher: Arc<ResultPublisher>,
        container: String,
    ) -> Self {
        Self {
            runtime,
            publisher,
            container,
        }
    }

    fn command(request: &ScanRequest) -> Vec<String> {
        let mut command = vec!["nmap".to_string()];
        command.extend(request.option_args());
        command.extend(["-oX".to_string(), "-".to_string(), request.target.clone()]);
        command
    }
}

#[async_trait]
impl ScanJobDefinition for NetworkScanJob {
    fn scan_type(&self) -> ScanType {
        ScanType::NetworkScan
    }

    async fn run(&self, ctx: &JobContext, request: &ScanRequest) -> Result<ScanResult, ScanError> {
        ctx.checkpoint(0, "Initializing network scan").await?;

        ctx.checkpoint(20, &format!("Scanning {}", request.target))
            .await?;
        let output = exec_tool(
            ctx,
            self.runtime.as_ref(),
            "nmap",
            &self.container,
            Self::command(request),
            true,
        )
        .await?;
        let report = output.stdout;

        ctx.checkpoint(60, "Uploading to storage").await?;
        let artifact = self
            .publisher
            .persist(ScanType::NetworkScan, &request.target, report.clone())
            .await?;

        ctx.checkpoint(80, "Importing to vulnerability management")
            .await?;
        let import = self
            .publisher
            .import(ImportRequest {
                scan_type: "Nmap Scan".to_string(),
                engagement_name: format!("Nmap Scan - {}", request.target),
                filename: artifact.filename.clone(),
                content_type: ScanType::NetworkScan.content_type().to_string(),
                content: report,
            })
            .await;

        ctx.checkpoint(100, "Completed").await?;
        info!(job_id = %ctx.job_id, target = %request.target, "Network scan finished");

        Ok(ScanResult::new(request, artifact, import))
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::super::test_support::*;
    use super::*;
    use crate::domain::entities::ImportResult;

    const NMAP_XML: &str = r#"<?xml version="1.0"?><nmaprun><host><address addr="10.0.0.5"/></host></nmaprun>"#;

    fn setup(
        runtime: FakeRuntime,
        dojo: RecordingDojo,
    ) -> (NetworkScanJob, Arc<FakeRuntime>, Arc<MemoryArtifacts>, Arc<RecordingDojo>) {
        let runtime = Arc::new(runtime);
        let artifacts = Arc::new(MemoryArtifacts::default());
        let dojo = Arc::new(dojo);
        let publisher = Arc::new(ResultPublisher::new(artifacts.clone(), dojo.clone()));
        let job = NetworkScanJob::new(runtime.clone(), publisher, "ptaas-nmap".to_string());
        (job, runtime, artifacts, dojo)
    }

    #[tokio::test]
    async fn test_network_scan_publishes_checkpoints() {
        let (job, runtime, artifacts, dojo) =
            setup(FakeRuntime::returning(0, NMAP_XML), RecordingDojo::imported());
        let store = Arc::new(RecordingJobStore::default());
        let request = ScanRequest::new(ScanType::NetworkScan, "10.0.0.5", None, "-sV -sC").unwrap();
        let ctx = job_context(store.clone(), &request, CancellationToken::new());

        let result = job.run(&ctx, &request).await.unwrap();

        assert_eq!(store.progress_values(), vec![0, 20, 60, 80, 100]);

        assert!(result.filename.starts_with("networkscan_10.0.0.5_"));
        assert!(result.filename.ends_with(".xml"));
        let timestamp = result
            .filename
            .trim_start_matches("networkscan_10.0.0.5_")
            .trim_end_matches(".xml");
        assert!(timestamp.parse::<i64>().is_ok());
        assert_eq!(result.status, "success");
        assert!(result.import.is_imported());

        let calls = runtime.calls.lock().unwrap();
        assert_eq!(calls[0].0, "ptaas-nmap");
        assert_eq!(calls[0].1, vec!["nmap", "-sV", "-sC", "-oX", "-", "10.0.0.5"]);

        let objects = artifacts.objects.lock().unwrap();
        let (content, content_type) = objects.get(&result.filename).unwrap();
        assert_eq!(content, NMAP_XML.as_bytes());
        assert_eq!(content_type, "application/xml");

        let imports = dojo.imports.lock().unwrap();
        assert_eq!(imports[0].scan_type, "Nmap Scan");
        assert_eq!(imports[0].engagement_name, "Nmap Scan - 10.0.0.5");
    }

    #[tokio::test]
    async fn test_failed_import_degrades_result() {
        let (job, _, _, _) = setup(FakeRuntime::returning(0, NMAP_XML), RecordingDojo::failing());
        let store = Arc::new(RecordingJobStore::default());
        let request = ScanRequest::new(ScanType::NetworkScan, "10.0.0.5", None, "-sV").unwrap();
        let ctx = job_context(store, &request, CancellationToken::new());

        let result = job.run(&ctx, &request).await.unwrap();

        assert!(matches!(
            result.import,
            ImportResult::Failed {
                status_code: Some(502),
                ..
            }
        ));
        assert!(result.storage_url.ends_with(&result.filename));
    }

    #[tokio::test]
    async fn test_non_zero_exit_fails_with_output() {
        let (job, _, artifacts, _) = setup(
            FakeRuntime::returning(1, "Failed to resolve \"nowhere\"."),
            RecordingDojo::imported(),
        );
        let store = Arc::new(RecordingJobStore::default());
        let request = ScanRequest::new(ScanType::NetworkScan, "nowhere", None, "-sV").unwrap();
        let ctx = job_context(store.clone(), &request, CancellationToken::new());

        let err = job.run(&ctx, &request).await.unwrap_err();

        assert!(matches!(err, ScanError::ToolExecution { exit_code: Some(1), .. }));
        assert!(err.to_string().contains("Failed to resolve"));
        assert_eq!(store.progress_values(), vec![0, 20]);
        assert!(artifacts.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_container_is_tool_unavailable() {
        let (job, _, _, _) = setup(
            FakeRuntime::failing(ScanError::unavailable("nmap", "No such container: ptaas-nmap")),
            RecordingDojo::imported(),
        );
        let request = ScanRequest::new(ScanType::NetworkScan, "10.0.0.5", None, "-sV").unwrap();
        let ctx = job_context(Arc::new(RecordingJobStore::default()), &request, CancellationToken::new());

        let err = job.run(&ctx, &request).await.unwrap_err();
        assert!(matches!(err, ScanError::ToolUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_job_stops_at_next_boundary() {
        let (job, runtime, _, _) =
            setup(FakeRuntime::returning(0, NMAP_XML), RecordingDojo::imported());
        let request = ScanRequest::new(ScanType::NetworkScan, "10.0.0.5", None, "-sV").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = job_context(Arc::new(RecordingJobStore::default()), &request, cancel);

        let err = job.run(&ctx, &request).await.unwrap_err();

        assert_eq!(err.to_string(), "soft time limit exceeded");
        assert!(runtime.calls.lock().unwrap().is_empty());
    }
}
