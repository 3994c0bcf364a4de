//! Configuration validation module

use crate::config::{
    DefectDojoConfig, LoggingConfig, QueueBackend, QueueConfig, ScannersConfig, ServerConfig,
    StorageConfig, WorkerConfig,
};

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Server configuration error: {message}")]
    Server { message: String },

    #[error("Queue configuration error: {message}")]
    Queue { message: String },

    #[error("Worker configuration error: {message}")]
    Worker { message: String },

    #[error("Scanner configuration error: {message}")]
    Scanner { message: String },

    #[error("Storage configuration error: {message}")]
    Storage { message: String },

    #[error("DefectDojo configuration error: {message}")]
    DefectDojo { message: String },

    #[error("Logging configuration error: {message}")]
    Logging { message: String },
}

impl ValidationError {
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    pub fn queue(message: impl Into<String>) -> Self {
        Self::Queue {
            message: message.into(),
        }
    }

    pub fn worker(message: impl Into<String>) -> Self {
        Self::Worker {
            message: message.into(),
        }
    }

    pub fn scanner(message: impl Into<String>) -> Self {
        Self::Scanner {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn defectdojo(message: impl Into<String>) -> Self {
        Self::DefectDojo {
            message: message.into(),
        }
    }

    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        // u16 cannot exceed 65535, only 0 is out of range
        if self.port == 0 {
            return Err(ValidationError::server(format!(
                "Port must be in range 1-65535, got {}",
                self.port
            )));
        }

        if self.host.is_empty() {
            return Err(ValidationError::server("Host cannot be empty"));
        }

        if self.request_timeout_seconds == 0 {
            return Err(ValidationError::server(
                "Request timeout must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Validate for QueueConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.backend == QueueBackend::Redis && !self.redis_url.starts_with("redis") {
            return Err(ValidationError::queue(format!(
                "Broker URL must use the redis:// or rediss:// scheme, got '{}'",
                self.redis_url
            )));
        }

        if self.queue_key.trim().is_empty() {
            return Err(ValidationError::queue("Queue key cannot be empty"));
        }

        if self.state_ttl_hours == 0 {
            return Err(ValidationError::queue(
                "Job state TTL must be greater than 0 hours",
            ));
        }

        if self.poll_timeout_seconds == 0 {
            return Err(ValidationError::queue(
                "Poll timeout must be greater than 0 seconds",
            ));
        }

        Ok(())
    }
}

impl Validate for WorkerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.concurrency == 0 {
            return Err(ValidationError::worker("Concurrency must be at least 1"));
        }

        if self.max_jobs_per_worker == 0 {
            return Err(ValidationError::worker(
                "max_jobs_per_worker must be at least 1",
            ));
        }

        if self.hard_time_limit_seconds == 0 {
            return Err(ValidationError::worker(
                "Hard time limit must be greater than 0",
            ));
        }

        if self.soft_time_limit_seconds >= self.hard_time_limit_seconds {
            return Err(ValidationError::worker(format!(
                "Soft time limit ({}s) must be shorter than the hard time limit ({}s)",
                self.soft_time_limit_seconds, self.hard_time_limit_seconds
            )));
        }

        Ok(())
    }
}

impl Validate for ScannersConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.docker_binary.trim().is_empty() {
            return Err(ValidationError::scanner("docker_binary cannot be empty"));
        }

        for (name, tool) in [("network", &self.network), ("injection", &self.injection)] {
            if tool.container.trim().is_empty() {
                return Err(ValidationError::scanner(format!(
                    "{} scanner container name cannot be empty",
                    name
                )));
            }
        }

        let web = &self.web;
        if !is_http_url(&web.base_url) {
            return Err(ValidationError::scanner(format!(
                "Web scanner base_url must be an http(s) URL, got '{}'",
                web.base_url
            )));
        }

        if web.crawl_poll_interval_ms == 0 || web.active_poll_interval_ms == 0 {
            return Err(ValidationError::scanner(
                "Web scanner poll intervals must be greater than 0",
            ));
        }

        if web.crawl_max_polls == 0 || web.active_max_polls == 0 {
            return Err(ValidationError::scanner(
                "Web scanner poll limits must be at least 1",
            ));
        }

        if web.request_timeout_seconds == 0 {
            return Err(ValidationError::scanner(
                "Web scanner request timeout must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Validate for StorageConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.bucket.trim().is_empty() {
            return Err(ValidationError::storage("Bucket name cannot be empty"));
        }

        if let Some(endpoint) = &self.endpoint
            && !is_http_url(endpoint)
        {
            return Err(ValidationError::storage(format!(
                "Storage endpoint must be an http(s) URL, got '{}'",
                endpoint
            )));
        }

        // Credentials come as a pair or fall back to the default provider chain
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(ValidationError::storage(
                "access_key and secret_key must be set together",
            ));
        }

        Ok(())
    }
}

impl Validate for DefectDojoConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !is_http_url(&self.url) {
            return Err(ValidationError::defectdojo(format!(
                "DefectDojo url must be an http(s) URL, got '{}'",
                self.url
            )));
        }

        if self.product_name.trim().is_empty() {
            return Err(ValidationError::defectdojo("Product name cannot be empty"));
        }

        if self.request_timeout_seconds == 0 {
            return Err(ValidationError::defectdojo(
                "Request timeout must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.format.as_str() {
            "json" | "pretty" => Ok(()),
            other => Err(ValidationError::logging(format!(
                "Unsupported log format '{}', expected 'json' or 'pretty'",
                other
            ))),
        }
    }
}
