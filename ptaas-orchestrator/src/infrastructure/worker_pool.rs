//! Scan worker pool
//!
//! A supervisor task owns `concurrency` workers. Each worker processes one job
//! at a time, rebuilds its clients after `max_jobs_per_worker` jobs and is
//! respawned if it panics. Every job runs in its own task under a soft limit
//! (cooperative cancellation observed at checkpoints) and a hard limit (the
//! task is aborted, which kills any running tool process). A panicking job is
//! recorded as a failure instead of taking the worker down.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ptaas_core::config::{QueueConfig, WorkerConfig};

use super::job_queue::JobQueue;
use crate::application::jobs::{ScanToolkit, ToolkitFactory};
use crate::application::workflow::{JobContext, JobWorkflow, ProgressReporter};
use crate::domain::entities::ScanRequest;
use crate::domain::services::Ticker;

/// Failure reason recorded when the hard limit terminates a job
pub const HARD_TIME_LIMIT_MESSAGE: &str = "hard time limit exceeded";

/// Prefix of the failure reason recorded when a job panics
pub const PANIC_MESSAGE_PREFIX: &str = "worker panicked";

/// Shared dependencies required by the scan workers.
#[derive(Clone)]
pub struct ScanWorkerContext {
    pub queue: Arc<dyn JobQueue>,
    pub workflow: JobWorkflow,
    pub toolkit_factory: Arc<dyn ToolkitFactory>,
    pub ticker: Arc<dyn Ticker>,
}

/// Pool sizing and per-job deadlines
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolSettings {
    pub concurrency: usize,
    pub max_jobs_per_worker: u32,
    pub soft_time_limit: Duration,
    pub hard_time_limit: Duration,
    pub poll_timeout: Duration,
}

impl WorkerPoolSettings {
    pub fn from_config(worker: &WorkerConfig, queue: &QueueConfig) -> Self {
        Self {
            concurrency: worker.concurrency.max(1),
            max_jobs_per_worker: worker.max_jobs_per_worker.max(1),
            soft_time_limit: worker.soft_time_limit(),
            hard_time_limit: worker.hard_time_limit(),
            poll_timeout: Duration::from_secs(queue.poll_timeout_seconds.max(1)),
        }
    }
}

/// Spawn the supervisor and its workers.
///
/// Idle workers notice `shutdown` within one poll timeout; jobs already
/// running are left to finish.
pub fn spawn_scan_worker_pool(
    context: ScanWorkerContext,
    settings: WorkerPoolSettings,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            concurrency = settings.concurrency,
            max_jobs_per_worker = settings.max_jobs_per_worker,
            "Scan worker pool started"
        );

        let mut workers = JoinSet::new();
        for worker_id in 0..settings.concurrency {
            workers.spawn(run_worker(
                worker_id,
                context.clone(),
                settings,
                shutdown.clone(),
            ));
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(worker_id) => debug!(worker_id, "Scan worker exited"),
                Err(err) if err.is_panic() && !shutdown.is_cancelled() => {
                    error!(error = %err, "Scan worker panicked; spawning a replacement");
                    workers.spawn(run_worker(
                        settings.concurrency,
                        context.clone(),
                        settings,
                        shutdown.clone(),
                    ));
                }
                Err(err) => warn!(error = %err, "Scan worker stopped abnormally"),
            }
        }

        warn!("Scan worker pool exiting");
    })
}

async fn run_worker(
    worker_id: usize,
    context: ScanWorkerContext,
    settings: WorkerPoolSettings,
    shutdown: CancellationToken,
) -> usize {
    let mut generation = 0u64;

    'generations: while !shutdown.is_cancelled() {
        let toolkit = match context.toolkit_factory.build().await {
            Ok(toolkit) => toolkit,
            Err(e) => {
                error!(worker_id, error = %e, "Failed to initialize scanner clients");
                tokio::select! {
                    _ = shutdown.cancelled() => break 'generations,
                    _ = tokio::time::sleep(settings.poll_timeout) => continue 'generations,
                }
            }
        };
        generation += 1;
        debug!(worker_id, generation, "Scan worker ready");

        let mut processed = 0u32;
        while processed < settings.max_jobs_per_worker {
            if shutdown.is_cancelled() {
                break 'generations;
            }

            // Not raced against shutdown: a cancelled BRPOP could drop a job
            // the broker already handed out.
            match context.queue.dequeue(settings.poll_timeout).await {
                Ok(Some(request)) => {
                    process_job(&context, &toolkit, &settings, request).await;
                    processed += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    error!(worker_id, error = %e, "Failed to poll job queue");
                    tokio::select! {
                        _ = shutdown.cancelled() => break 'generations,
                        _ = tokio::time::sleep(settings.poll_timeout) => {}
                    }
                }
            }
        }

        info!(worker_id, generation, processed, "Recycling scan worker");
    }

    worker_id
}

async fn process_job(
    context: &ScanWorkerContext,
    toolkit: &ScanToolkit,
    settings: &WorkerPoolSettings,
    request: ScanRequest,
) {
    let job_id = request.job_id;
    info!(
        job_id = %job_id,
        scan_type = %request.scan_type,
        target = %request.target,
        "Processing scan job"
    );

    let cancel = CancellationToken::new();
    let reporter = ProgressReporter::new(context.workflow.clone(), request.clone());
    let job_context = JobContext::new(reporter, cancel.clone(), context.ticker.clone());
    let definition = toolkit.definition(request.scan_type);

    let soft_timer = {
        let cancel = cancel.clone();
        let limit = settings.soft_time_limit;
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            cancel.cancel();
        })
    };

    let run = {
        let request = request.clone();
        tokio::spawn(async move { definition.run(&job_context, &request).await })
    };
    let abort = run.abort_handle();

    let outcome = tokio::time::timeout(settings.hard_time_limit, run).await;
    soft_timer.abort();

    // ── Workflow: STARTED → SUCCESS | FAILURE ────────────────────────
    let published = match outcome {
        Ok(Ok(Ok(result))) => context.workflow.succeed(&request, result).await,
        Ok(Ok(Err(err))) => {
            warn!(job_id = %job_id, error = %err, code = err.code(), "Scan job failed");
            context.workflow.fail(&request, &err.to_string()).await
        }
        Ok(Err(join_err)) => {
            let reason = if join_err.is_panic() {
                format!("{}: {}", PANIC_MESSAGE_PREFIX, panic_message(join_err.into_panic()))
            } else {
                format!("{}: job task cancelled", PANIC_MESSAGE_PREFIX)
            };
            error!(job_id = %job_id, reason = %reason, "Scan job aborted");
            context.workflow.fail(&request, &reason).await
        }
        Err(_) => {
            abort.abort();
            error!(job_id = %job_id, "Scan job killed at hard time limit");
            context
                .workflow
                .fail(&request, HARD_TIME_LIMIT_MESSAGE)
                .await
        }
    };

    if let Err(e) = published {
        error!(job_id = %job_id, error = %e, "Failed to publish terminal job state");
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::application::classifier::KeywordInjectionClassifier;
    use crate::application::jobs::test_support::{FakeRuntime, MemoryArtifacts, RecordingDojo};
    use crate::application::publisher::ResultPublisher;
    use crate::domain::errors::ScanError;
    use crate::domain::services::{ContainerRuntime, ExecOutput, TokioTicker, WebScannerApi};
    use crate::domain::state::JobState;
    use crate::domain::value_objects::ScanType;
    use crate::infrastructure::job_queue::InMemoryJobQueue;
    use crate::infrastructure::job_store::{InMemoryJobStore, JobStore};
    use ptaas_core::config::ScannersConfig;

    // ── Helpers ──────────────────────────────────────────────────────

    /// Web scanner that is never reachable
    struct OfflineScanner;

    #[async_trait]
    impl WebScannerApi for OfflineScanner {
        async fn access_url(&self, _url: &str) -> Result<(), ScanError> {
            Err(ScanError::unavailable("zap", "offline"))
        }
        async fn start_crawl(&self, _url: &str) -> Result<String, ScanError> {
            Err(ScanError::unavailable("zap", "offline"))
        }
        async fn crawl_status(&self, _scan_id: &str) -> Result<u8, ScanError> {
            Err(ScanError::unavailable("zap", "offline"))
        }
        async fn start_active_scan(&self, _url: &str) -> Result<String, ScanError> {
            Err(ScanError::unavailable("zap", "offline"))
        }
        async fn active_scan_status(&self, _scan_id: &str) -> Result<u8, ScanError> {
            Err(ScanError::unavailable("zap", "offline"))
        }
        async fn json_report(&self) -> Result<Vec<u8>, ScanError> {
            Err(ScanError::unavailable("zap", "offline"))
        }
    }

    /// Runtime whose commands never finish
    struct HangingRuntime;

    #[async_trait]
    impl ContainerRuntime for HangingRuntime {
        async fn exec(&self, _container: &str, _command: &[String]) -> Result<ExecOutput, ScanError> {
            std::future::pending().await
        }
    }

    /// Runtime that ignores cancellation by never yielding to it
    struct StubbornRuntime;

    #[async_trait]
    impl ContainerRuntime for StubbornRuntime {
        async fn exec(&self, _container: &str, _command: &[String]) -> Result<ExecOutput, ScanError> {
            tokio::time::sleep(Duration::from_secs(3600 * 24)).await;
            Ok(ExecOutput::default())
        }
    }

    /// Runtime that panics on every command
    struct PanickingRuntime;

    #[async_trait]
    impl ContainerRuntime for PanickingRuntime {
        async fn exec(&self, _container: &str, _command: &[String]) -> Result<ExecOutput, ScanError> {
            panic!("container client state corrupted");
        }
    }

    struct CountingFactory {
        runtime: Arc<dyn ContainerRuntime>,
        builds: AtomicU32,
    }

    impl CountingFactory {
        fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
            Self {
                runtime,
                builds: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ToolkitFactory for CountingFactory {
        async fn build(&self) -> Result<ScanToolkit, ScanError> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(ScanToolkit {
                runtime: self.runtime.clone(),
                web_scanner: Arc::new(OfflineScanner),
                publisher: Arc::new(ResultPublisher::new(
                    Arc::new(MemoryArtifacts::default()),
                    Arc::new(RecordingDojo::imported()),
                )),
                classifier: Arc::new(KeywordInjectionClassifier),
                scanners: Arc::new(ScannersConfig::default()),
            })
        }
    }

    fn settings(soft: Duration, hard: Duration, max_jobs: u32) -> WorkerPoolSettings {
        WorkerPoolSettings {
            concurrency: 1,
            max_jobs_per_worker: max_jobs,
            soft_time_limit: soft,
            hard_time_limit: hard,
            poll_timeout: Duration::from_secs(1),
        }
    }

    struct Pool {
        store: Arc<InMemoryJobStore>,
        queue: Arc<InMemoryJobQueue>,
        factory: Arc<CountingFactory>,
        shutdown: CancellationToken,
        handle: JoinHandle<()>,
    }

    fn start_pool(runtime: Arc<dyn ContainerRuntime>, settings: WorkerPoolSettings) -> Pool {
        let store = Arc::new(InMemoryJobStore::default());
        let queue = Arc::new(InMemoryJobQueue::new());
        let factory = Arc::new(CountingFactory::new(runtime));
        let shutdown = CancellationToken::new();
        let handle = spawn_scan_worker_pool(
            ScanWorkerContext {
                queue: queue.clone(),
                workflow: JobWorkflow::new(store.clone()),
                toolkit_factory: factory.clone(),
                ticker: Arc::new(TokioTicker),
            },
            settings,
            shutdown.clone(),
        );
        Pool {
            store,
            queue,
            factory,
            shutdown,
            handle,
        }
    }

    async fn submit(pool: &Pool, target: &str) -> ScanRequest {
        let request = ScanRequest::new(ScanType::NetworkScan, target, None, "-sV").unwrap();
        JobWorkflow::new(pool.store.clone())
            .enqueue(&request)
            .await
            .unwrap();
        pool.queue.enqueue(&request).await.unwrap();
        request
    }

    async fn wait_terminal(store: &InMemoryJobStore, job_id: Uuid) -> JobState {
        for _ in 0..10_000 {
            if let Some(snapshot) = store.get_snapshot(job_id).await.unwrap()
                && snapshot.state.is_terminal()
            {
                return snapshot.state;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("job {} never reached a terminal state", job_id);
    }

    // ── Tests ────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_job_runs_to_success() {
        let runtime = Arc::new(FakeRuntime::returning(0, "<nmaprun/>"));
        let pool = start_pool(
            runtime,
            settings(Duration::from_secs(60), Duration::from_secs(120), 10),
        );

        let request = submit(&pool, "10.0.0.5").await;
        let state = wait_terminal(&pool.store, request.job_id).await;

        match state {
            JobState::Success { result } => {
                assert_eq!(result.status, "success");
                assert_eq!(result.target, "10.0.0.5");
            }
            other => panic!("unexpected state: {:?}", other),
        }

        pool.shutdown.cancel();
        pool.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tool_marks_failure() {
        let runtime = Arc::new(FakeRuntime::failing(ScanError::unavailable(
            "nmap",
            "No such container: ptaas-nmap",
        )));
        let pool = start_pool(
            runtime,
            settings(Duration::from_secs(60), Duration::from_secs(120), 10),
        );

        let request = submit(&pool, "10.0.0.5").await;
        let state = wait_terminal(&pool.store, request.job_id).await;

        match state {
            JobState::Failure { error } => assert!(error.contains("ptaas-nmap")),
            other => panic!("unexpected state: {:?}", other),
        }
        pool.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_limit_interrupts_running_tool() {
        let pool = start_pool(
            Arc::new(HangingRuntime),
            settings(Duration::from_secs(5), Duration::from_secs(60), 10),
        );

        let request = submit(&pool, "10.0.0.5").await;
        let state = wait_terminal(&pool.store, request.job_id).await;

        assert_eq!(
            state,
            JobState::Failure {
                error: "soft time limit exceeded".to_string()
            }
        );
        pool.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_limit_terminates_job() {
        let pool = start_pool(
            Arc::new(StubbornRuntime),
            settings(Duration::from_secs(3600 * 48), Duration::from_secs(10), 10),
        );

        let request = submit(&pool, "10.0.0.5").await;
        let state = wait_terminal(&pool.store, request.job_id).await;

        assert_eq!(
            state,
            JobState::Failure {
                error: HARD_TIME_LIMIT_MESSAGE.to_string()
            }
        );
        pool.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_job_is_marked_failed() {
        let pool = start_pool(
            Arc::new(PanickingRuntime),
            settings(Duration::from_secs(60), Duration::from_secs(120), 10),
        );

        let first = submit(&pool, "10.0.0.5").await;
        let state = wait_terminal(&pool.store, first.job_id).await;

        assert_eq!(
            state,
            JobState::Failure {
                error: "worker panicked: container client state corrupted".to_string()
            }
        );

        // The same worker keeps consuming the queue
        let second = submit(&pool, "10.0.0.6").await;
        assert!(wait_terminal(&pool.store, second.job_id).await.is_terminal());
        assert_eq!(pool.factory.builds.load(Ordering::SeqCst), 1);

        pool.shutdown.cancel();
        pool.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_recycles_after_job_budget() {
        let runtime = Arc::new(FakeRuntime::returning(0, "<nmaprun/>"));
        let pool = start_pool(
            runtime,
            settings(Duration::from_secs(60), Duration::from_secs(120), 1),
        );

        let first = submit(&pool, "10.0.0.1").await;
        wait_terminal(&pool.store, first.job_id).await;
        let second = submit(&pool, "10.0.0.2").await;
        wait_terminal(&pool.store, second.job_id).await;

        assert!(pool.factory.builds.load(Ordering::SeqCst) >= 2);

        pool.shutdown.cancel();
        pool.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_idle_pool() {
        let runtime = Arc::new(FakeRuntime::returning(0, ""));
        let pool = start_pool(
            runtime,
            settings(Duration::from_secs(60), Duration::from_secs(120), 10),
        );

        pool.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(10), pool.handle)
            .await
            .unwrap()
            .unwrap();
    }
}
