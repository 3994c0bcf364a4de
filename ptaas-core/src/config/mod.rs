//! Configuration management

pub mod validation;

pub use validation::{Validate, ValidationError};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
    pub scanners: ScannersConfig,
    pub storage: StorageConfig,
    pub defectdojo: DefectDojoConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Whether to expose interactive API docs (Swagger UI).
    pub enable_docs: bool,
    /// Global request timeout in seconds applied at the HTTP layer.
    pub request_timeout_seconds: u64,
    /// Grace period given to background workers on shutdown.
    pub shutdown_timeout_seconds: u64,
    /// Allowed CORS origins. Use ["*"] to allow any (development only).
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_docs: true,
            request_timeout_seconds: 30,
            shutdown_timeout_seconds: 5,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Backend holding the job queue and the published job states
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackend {
    /// Redis-compatible broker shared by the API and any number of worker processes
    #[default]
    Redis,
    /// In-process queue (single process development only)
    Memory,
}

/// Job queue and job state configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    /// Broker connection URL (e.g., "redis://127.0.0.1:6379/0")
    pub redis_url: String,
    /// List key used as the durable job queue
    pub queue_key: String,
    /// How long published job states are kept, in hours
    pub state_ttl_hours: u64,
    /// Blocking pop timeout; bounds how quickly idle workers notice shutdown
    pub poll_timeout_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::Redis,
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            queue_key: "ptaas:scan_queue".to_string(),
            state_ttl_hours: 24,
            poll_timeout_seconds: 5,
        }
    }
}

impl QueueConfig {
    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_hours * 3600)
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Run the worker pool inside the API server process
    pub embedded: bool,
    /// Number of workers; each processes one job at a time
    pub concurrency: usize,
    /// A worker is recycled after processing this many jobs
    pub max_jobs_per_worker: u32,
    /// Graceful abort deadline per job
    pub soft_time_limit_seconds: u64,
    /// Forced termination deadline per job
    pub hard_time_limit_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            embedded: true,
            concurrency: 2,
            max_jobs_per_worker: 50,
            soft_time_limit_seconds: 3300,
            hard_time_limit_seconds: 3600,
        }
    }
}

impl WorkerConfig {
    pub fn soft_time_limit(&self) -> Duration {
        Duration::from_secs(self.soft_time_limit_seconds)
    }

    pub fn hard_time_limit(&self) -> Duration {
        Duration::from_secs(self.hard_time_limit_seconds)
    }
}

/// Scanner tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannersConfig {
    /// Container runtime CLI used to exec into tool containers
    pub docker_binary: String,
    pub network: ContainerToolConfig,
    pub injection: ContainerToolConfig,
    pub web: WebScannerConfig,
}

impl Default for ScannersConfig {
    fn default() -> Self {
        Self {
            docker_binary: "docker".to_string(),
            network: ContainerToolConfig {
                container: "ptaas-nmap".to_string(),
                default_options: "-sV -sC".to_string(),
            },
            injection: ContainerToolConfig {
                container: "ptaas-sqlmap".to_string(),
                default_options: "--batch --level=1 --risk=1".to_string(),
            },
            web: WebScannerConfig::default(),
        }
    }
}

/// A scanner that runs inside a long-lived container
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ContainerToolConfig {
    pub container: String,
    /// Argument string used when a request carries no options
    pub default_options: String,
}

/// Web application scanner control API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebScannerConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Scan mode used when a request carries no options ("active" or "passive")
    pub default_mode: String,
    /// Pause after asking the scanner to access the target
    pub access_settle_ms: u64,
    pub crawl_poll_interval_ms: u64,
    pub crawl_max_polls: u32,
    pub active_poll_interval_ms: u64,
    pub active_max_polls: u32,
    pub request_timeout_seconds: u64,
}

impl Default for WebScannerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://zap:8080".to_string(),
            api_key: None,
            default_mode: "active".to_string(),
            access_settle_ms: 2000,
            crawl_poll_interval_ms: 3000,
            // 30 minutes of crawling at the default interval
            crawl_max_polls: 600,
            active_poll_interval_ms: 5000,
            // 55 minutes of active probing at the default interval
            active_max_polls: 660,
            request_timeout_seconds: 30,
        }
    }
}

/// S3-compatible object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Custom endpoint (MinIO); `None` targets AWS S3
    pub endpoint: Option<String>,
    pub bucket: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: String,
    /// Create the bucket at startup when it does not exist
    pub create_bucket: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: Some("http://minio:9000".to_string()),
            bucket: "ptaas".to_string(),
            access_key: None,
            secret_key: None,
            region: "us-east-1".to_string(),
            create_bucket: true,
        }
    }
}

/// Vulnerability management (DefectDojo) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefectDojoConfig {
    pub url: String,
    pub api_key: Option<String>,
    /// Product every import is filed under (created when missing)
    pub product_name: String,
    /// Product type created when the instance has none
    pub product_type_name: String,
    pub request_timeout_seconds: u64,
}

impl Default for DefectDojoConfig {
    fn default() -> Self {
        Self {
            url: "http://nginx:8080".to_string(),
            api_key: None,
            product_name: "PTaaS Lab Project".to_string(),
            product_type_name: "Security Testing".to_string(),
            request_timeout_seconds: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" or "pretty"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.queue.validate()?;
        self.worker.validate()?;
        self.scanners.validate()?;
        self.storage.validate()?;
        self.defectdojo.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        builder = builder
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("PTAAS").separator("__"));

        let mut config: Config = builder.build()?.try_deserialize()?;

        // Conventional broker variable wins over the layered sources
        if let Ok(redis_url) = std::env::var("REDIS_URL") {
            config.queue.redis_url = redis_url;
        }

        config.validate()?;

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}
