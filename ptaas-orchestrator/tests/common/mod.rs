//! Shared harness for ptaas-orchestrator integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use ptaas_core::Config;
use ptaas_core::config::ScannersConfig;
use ptaas_orchestrator::application::{
    ArtifactAccessUseCase, GetScanStatusUseCase, JobWorkflow, KeywordInjectionClassifier,
    ResultPublisher, ScanRegistryHandle, ScanToolkit, SubmitScanUseCase, ToolkitFactory,
};
use ptaas_orchestrator::domain::{
    ArtifactObject, ArtifactStore, ContainerRuntime, ExecOutput, FindingSummary, FindingsQuery,
    ImportRequest, ImportResult, ScanError, Ticker, VulnerabilityManagement, WebScannerApi,
};
use ptaas_orchestrator::infrastructure::{
    InMemoryJobQueue, InMemoryJobStore, JobQueue, JobStore, ScanWorkerContext,
    WorkerPoolSettings, spawn_scan_worker_pool,
};
use ptaas_orchestrator::presentation::controllers::OrchestratorState;
use ptaas_orchestrator::presentation::models::DependencyConfiguration;
use ptaas_orchestrator::presentation::routes::create_router;

pub const NMAP_XML: &str = r#"<?xml version="1.0"?><nmaprun scanner="nmap"><host><ports><port protocol="tcp" portid="22"/></ports></host></nmaprun>"#;

/// Object store kept in a map
#[derive(Default)]
pub struct MemoryArtifacts {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl ArtifactStore for MemoryArtifacts {
    async fn put(&self, key: &str, content: Vec<u8>, _content_type: &str) -> Result<String, ScanError> {
        self.objects.lock().unwrap().insert(key.to_string(), content);
        Ok(format!("http://minio:9000/ptaas-results/{}", key))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ScanError> {
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ArtifactObject>, ScanError> {
        let objects = self.objects.lock().unwrap();
        let mut listing: Vec<ArtifactObject> = objects
            .iter()
            .filter(|(key, _)| prefix.is_none_or(|p| key.starts_with(p)))
            .map(|(key, content)| ArtifactObject {
                key: key.clone(),
                size: content.len() as i64,
                last_modified: None,
            })
            .collect();
        listing.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listing)
    }

    async fn delete(&self, key: &str) -> Result<(), ScanError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Vulnerability manager that accepts every import and serves canned findings
#[derive(Default)]
pub struct StaticDojo {
    pub imports: Mutex<Vec<ImportRequest>>,
    pub findings: Vec<FindingSummary>,
}

#[async_trait]
impl VulnerabilityManagement for StaticDojo {
    async fn import_scan(&self, request: ImportRequest) -> ImportResult {
        self.imports.lock().unwrap().push(request);
        ImportResult::Imported {
            product_id: Some(1),
            engagement_id: Some(7),
            test_id: Some(42),
            scan_type: Some("Nmap Scan".to_string()),
        }
    }

    async fn findings(&self, query: &FindingsQuery) -> Vec<FindingSummary> {
        self.findings
            .iter()
            .filter(|f| query.severity.as_ref().is_none_or(|s| &f.severity == s))
            .take(query.limit as usize)
            .cloned()
            .collect()
    }

    async fn finding(&self, id: i64) -> Option<FindingSummary> {
        self.findings.iter().find(|f| f.id == id).cloned()
    }

    async fn products(&self) -> Vec<Value> {
        vec![serde_json::json!({"id": 1, "name": "PTaaS Lab Project"})]
    }

    async fn engagements(&self, _product_id: Option<i64>) -> Vec<Value> {
        Vec::new()
    }

    async fn tests(&self, _engagement_id: Option<i64>) -> Vec<Value> {
        Vec::new()
    }
}

/// Container runtime answering every command with the same output
pub struct CannedRuntime {
    pub exit_code: i32,
    pub stdout: String,
}

#[async_trait]
impl ContainerRuntime for CannedRuntime {
    async fn exec(&self, _container: &str, _command: &[String]) -> Result<ExecOutput, ScanError> {
        Ok(ExecOutput {
            exit_code: Some(self.exit_code),
            stdout: self.stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
        })
    }
}

/// Records every command before delegating to a canned runtime
pub struct RecordingRuntime {
    inner: CannedRuntime,
    pub commands: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl ContainerRuntime for RecordingRuntime {
    async fn exec(&self, container: &str, command: &[String]) -> Result<ExecOutput, ScanError> {
        self.commands.lock().unwrap().push(command.to_vec());
        self.inner.exec(container, command).await
    }
}

/// Web scanner that is never reachable; counts the calls it refuses
#[derive(Default)]
pub struct UnreachableScanner {
    pub calls: AtomicUsize,
}

impl UnreachableScanner {
    fn refuse<T>(&self) -> Result<T, ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ScanError::unavailable("zap", "connection refused"))
    }
}

#[async_trait]
impl WebScannerApi for UnreachableScanner {
    async fn access_url(&self, _url: &str) -> Result<(), ScanError> {
        self.refuse()
    }
    async fn start_crawl(&self, _url: &str) -> Result<String, ScanError> {
        self.refuse()
    }
    async fn crawl_status(&self, _scan_id: &str) -> Result<u8, ScanError> {
        self.refuse()
    }
    async fn start_active_scan(&self, _url: &str) -> Result<String, ScanError> {
        self.refuse()
    }
    async fn active_scan_status(&self, _scan_id: &str) -> Result<u8, ScanError> {
        self.refuse()
    }
    async fn json_report(&self) -> Result<Vec<u8>, ScanError> {
        self.refuse()
    }
}

pub struct NoDelay;

#[async_trait]
impl Ticker for NoDelay {
    async fn tick(&self, _interval: Duration) {
        tokio::task::yield_now().await;
    }
}

pub struct FixedToolkit(pub ScanToolkit);

#[async_trait]
impl ToolkitFactory for FixedToolkit {
    async fn build(&self) -> Result<ScanToolkit, ScanError> {
        Ok(self.0.clone())
    }
}

/// A router wired to in-memory backends, optionally with workers attached
pub struct TestApp {
    pub router: Router,
    pub queue: Arc<InMemoryJobQueue>,
    pub job_store: Arc<InMemoryJobStore>,
    pub artifacts: Arc<MemoryArtifacts>,
    pub dojo: Arc<StaticDojo>,
    /// Present when workers are attached
    pub runtime: Option<Arc<RecordingRuntime>>,
    pub web_scanner: Arc<UnreachableScanner>,
    pub shutdown: CancellationToken,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.enable_docs = false;
    config.worker.embedded = false;
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(StaticDojo::default(), None)
    }

    pub fn with_findings(findings: Vec<FindingSummary>) -> Self {
        Self::build(
            StaticDojo {
                findings,
                ..Default::default()
            },
            None,
        )
    }

    /// Run one worker whose container commands all return `runtime`'s output
    pub fn with_workers(runtime: CannedRuntime) -> Self {
        Self::build(StaticDojo::default(), Some(runtime))
    }

    fn build(dojo: StaticDojo, runtime: Option<CannedRuntime>) -> Self {
        let config = test_config();
        let shutdown = CancellationToken::new();
        let job_store = Arc::new(InMemoryJobStore::default());
        let queue = Arc::new(InMemoryJobQueue::new());
        let artifacts = Arc::new(MemoryArtifacts::default());
        let dojo = Arc::new(dojo);
        let scanners = Arc::new(ScannersConfig::default());
        let web_scanner = Arc::new(UnreachableScanner::default());

        let store: Arc<dyn JobStore> = job_store.clone();
        let job_queue: Arc<dyn JobQueue> = queue.clone();

        let registry = ScanRegistryHandle::spawn(store.clone(), shutdown.clone());
        let workflow = Arc::new(JobWorkflow::new(store.clone()));

        let runtime = runtime.map(|inner| {
            Arc::new(RecordingRuntime {
                inner,
                commands: Mutex::new(Vec::new()),
            })
        });

        if let Some(runtime) = &runtime {
            let toolkit = ScanToolkit {
                runtime: runtime.clone(),
                web_scanner: web_scanner.clone(),
                publisher: Arc::new(ResultPublisher::new(artifacts.clone(), dojo.clone())),
                classifier: Arc::new(KeywordInjectionClassifier),
                scanners: scanners.clone(),
            };
            let context = ScanWorkerContext {
                queue: job_queue.clone(),
                workflow: JobWorkflow::new(store.clone()),
                toolkit_factory: Arc::new(FixedToolkit(toolkit)),
                ticker: Arc::new(NoDelay),
            };
            let settings = WorkerPoolSettings {
                concurrency: 1,
                max_jobs_per_worker: 10,
                soft_time_limit: Duration::from_secs(30),
                hard_time_limit: Duration::from_secs(60),
                poll_timeout: Duration::from_millis(50),
            };
            spawn_scan_worker_pool(context, settings, shutdown.clone());
        }

        let state = OrchestratorState {
            submit_scan_use_case: Arc::new(SubmitScanUseCase::new(
                workflow,
                job_queue.clone(),
                registry.clone(),
                scanners,
            )),
            scan_status_use_case: Arc::new(GetScanStatusUseCase::new(store, registry.clone())),
            artifact_use_case: Arc::new(ArtifactAccessUseCase::new(
                registry.clone(),
                artifacts.clone(),
            )),
            registry,
            vulnerability_management: dojo.clone(),
            queue: job_queue,
            dependencies: Arc::new(DependencyConfiguration {
                queue_backend: "memory".to_string(),
                defectdojo_url: config.defectdojo.url.clone(),
                defectdojo_configured: false,
                storage_endpoint: config.storage.endpoint.clone(),
                storage_bucket: config.storage.bucket.clone(),
                web_scanner_url: config.scanners.web.base_url.clone(),
            }),
        };

        Self {
            router: create_router(state, Arc::new(config)),
            queue,
            job_store,
            artifacts,
            dojo,
            runtime,
            web_scanner,
            shutdown,
        }
    }

    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    pub async fn json(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = self.request(method, uri, body).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Poll the status endpoint until the job reaches SUCCESS or FAILURE
    pub async fn wait_terminal(&self, job_id: &str) -> Value {
        for _ in 0..200 {
            let (status, body) = self.json("GET", &format!("/api/v1/scans/{}", job_id), None).await;
            assert_eq!(status, StatusCode::OK);
            if matches!(body["state"].as_str(), Some("SUCCESS" | "FAILURE")) {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {} never reached a terminal state", job_id);
    }
}

pub fn finding(id: i64, severity: &str) -> FindingSummary {
    FindingSummary {
        id,
        title: format!("Finding {}", id),
        severity: severity.to_string(),
        description: None,
        mitigation: None,
        impact: None,
        references: None,
        cve: None,
        cvss_score: None,
        found_by: vec![],
        url: None,
        date: None,
        active: true,
        verified: false,
    }
}
