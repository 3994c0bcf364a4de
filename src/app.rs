//! Application wiring shared by the API server and the standalone worker

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ptaas_core::Config;
use ptaas_core::config::QueueBackend;
use ptaas_core::infrastructure::RedisBroker;
use ptaas_orchestrator::application::registry::ScanRegistryHandle;
use ptaas_orchestrator::application::use_cases::{
    ArtifactAccessUseCase, GetScanStatusUseCase, SubmitScanUseCase,
};
use ptaas_orchestrator::application::workflow::JobWorkflow;
use ptaas_orchestrator::domain::services::{TokioTicker, VulnerabilityManagement};
use ptaas_orchestrator::infrastructure::{
    DefaultToolkitFactory, DefectDojoClient, InMemoryJobQueue, InMemoryJobStore, JobQueue,
    JobStore, RedisJobQueue, RedisJobStore, S3ArtifactStore, ScanWorkerContext,
    WorkerPoolSettings, spawn_scan_worker_pool,
};
use ptaas_orchestrator::presentation::controllers::OrchestratorState;
use ptaas_orchestrator::presentation::models::DependencyConfiguration;
use ptaas_orchestrator::presentation::routes::create_router;

pub type AppError = Box<dyn std::error::Error + Send + Sync>;

pub struct AppHandle {
    pub router: Router,
    pub shutdown_token: CancellationToken,
    /// Present when the worker pool runs inside the API process
    pub worker_pool: Option<JoinHandle<()>>,
}

/// Job queue and job state store, shared by API and workers
#[derive(Clone)]
pub struct Backend {
    pub job_store: Arc<dyn JobStore>,
    pub queue: Arc<dyn JobQueue>,
}

impl Backend {
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        match config.queue.backend {
            QueueBackend::Redis => {
                tracing::info!("Connecting to broker at {}", config.queue.redis_url);
                let broker = RedisBroker::connect(&config.queue.redis_url)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to connect to broker: {}", e);
                        e
                    })?;

                Ok(Self {
                    job_store: Arc::new(RedisJobStore::new(
                        broker.clone(),
                        config.queue.state_ttl(),
                    )),
                    queue: Arc::new(RedisJobQueue::new(broker, config.queue.queue_key.clone())),
                })
            }
            QueueBackend::Memory => {
                tracing::warn!("Using in-memory job queue; workers must run in this process");
                Ok(Self {
                    job_store: Arc::new(InMemoryJobStore::new(config.queue.state_ttl())),
                    queue: Arc::new(InMemoryJobQueue::new()),
                })
            }
        }
    }
}

/// Start the worker pool against `backend`.
pub fn spawn_workers(
    config: &Config,
    backend: &Backend,
    shutdown_token: CancellationToken,
) -> JoinHandle<()> {
    let context = ScanWorkerContext {
        queue: backend.queue.clone(),
        workflow: JobWorkflow::new(backend.job_store.clone()),
        toolkit_factory: Arc::new(DefaultToolkitFactory::new(
            config.scanners.clone(),
            config.storage.clone(),
            config.defectdojo.clone(),
        )),
        ticker: Arc::new(TokioTicker),
    };

    spawn_scan_worker_pool(
        context,
        WorkerPoolSettings::from_config(&config.worker, &config.queue),
        shutdown_token,
    )
}

/// Connect the artifact bucket, creating it when configured to.
pub async fn artifact_store(config: &Config) -> S3ArtifactStore {
    let store = S3ArtifactStore::connect(&config.storage).await;
    if config.storage.create_bucket
        && let Err(e) = store.ensure_bucket().await
    {
        tracing::warn!(error = %e, "Artifact bucket bootstrap failed (non-fatal)");
    }
    store
}

pub async fn create_app(config: Config) -> Result<AppHandle, AppError> {
    let startup_time = Instant::now();
    let config_arc = Arc::new(config.clone());
    let shutdown_token = CancellationToken::new();

    let backend = Backend::connect(&config).await?;
    let artifacts = Arc::new(artifact_store(&config).await);
    let vulnerability_management: Arc<dyn VulnerabilityManagement> =
        Arc::new(DefectDojoClient::new(&config.defectdojo));

    let registry = ScanRegistryHandle::spawn(backend.job_store.clone(), shutdown_token.clone());
    let workflow = Arc::new(JobWorkflow::new(backend.job_store.clone()));

    let submit_scan_use_case = Arc::new(SubmitScanUseCase::new(
        workflow,
        backend.queue.clone(),
        registry.clone(),
        Arc::new(config.scanners.clone()),
    ));
    let scan_status_use_case = Arc::new(GetScanStatusUseCase::new(
        backend.job_store.clone(),
        registry.clone(),
    ));
    let artifact_use_case = Arc::new(ArtifactAccessUseCase::new(registry.clone(), artifacts));

    let worker_pool = if config.worker.embedded {
        Some(spawn_workers(&config, &backend, shutdown_token.clone()))
    } else {
        tracing::info!("Embedded workers disabled; run ptaas-worker to process scans");
        None
    };

    let dependencies = DependencyConfiguration {
        queue_backend: match config.queue.backend {
            QueueBackend::Redis => "redis".to_string(),
            QueueBackend::Memory => "memory".to_string(),
        },
        defectdojo_url: config.defectdojo.url.clone(),
        defectdojo_configured: config.defectdojo.api_key.is_some(),
        storage_endpoint: config.storage.endpoint.clone(),
        storage_bucket: config.storage.bucket.clone(),
        web_scanner_url: config.scanners.web.base_url.clone(),
    };

    let orchestrator_state = OrchestratorState {
        submit_scan_use_case,
        scan_status_use_case,
        artifact_use_case,
        registry,
        vulnerability_management,
        queue: backend.queue.clone(),
        dependencies: Arc::new(dependencies),
    };

    let router = create_router(orchestrator_state, config_arc);

    tracing::info!(
        elapsed_ms = startup_time.elapsed().as_millis(),
        "Application initialized"
    );

    Ok(AppHandle {
        router,
        shutdown_token,
        worker_pool,
    })
}
