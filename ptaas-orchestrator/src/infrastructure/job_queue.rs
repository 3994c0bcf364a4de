//! Durable scan job queue
//!
//! The API pushes [`ScanRequest`]s; workers pop them. The Redis backend is a
//! list shared by any number of worker processes, the in-memory backend serves
//! single-process development setups.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tracing::error;

use ptaas_core::infrastructure::RedisBroker;

use crate::domain::entities::ScanRequest;

/// Errors that can occur when talking to the queue.
#[derive(thiserror::Error, Debug)]
pub enum JobQueueError {
    #[error("Failed to enqueue job: {0}")]
    EnqueueFailed(String),
    #[error("Failed to dequeue job: {0}")]
    DequeueFailed(String),
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, request: &ScanRequest) -> Result<(), JobQueueError>;

    /// Wait up to `timeout` for the next job.
    async fn dequeue(&self, timeout: Duration) -> Result<Option<ScanRequest>, JobQueueError>;

    /// Jobs waiting to be picked up
    async fn depth(&self) -> Result<u64, JobQueueError>;
}

/// Queue backed by a broker list (`LPUSH` / `BRPOP`, FIFO).
#[derive(Clone)]
pub struct RedisJobQueue {
    broker: RedisBroker,
    key: String,
}

impl RedisJobQueue {
    pub fn new(broker: RedisBroker, key: impl Into<String>) -> Self {
        Self {
            broker,
            key: key.into(),
        }
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, request: &ScanRequest) -> Result<(), JobQueueError> {
        self.broker.lpush(&self.key, request).await.map_err(|e| {
            error!("Failed to enqueue job: {}", e);
            JobQueueError::EnqueueFailed(e.to_string())
        })
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<ScanRequest>, JobQueueError> {
        self.broker
            .brpop::<ScanRequest>(&self.key, timeout)
            .await
            .map_err(|e| JobQueueError::DequeueFailed(e.to_string()))
    }

    async fn depth(&self) -> Result<u64, JobQueueError> {
        self.broker
            .llen(&self.key)
            .await
            .map_err(|e| JobQueueError::DequeueFailed(e.to_string()))
    }
}

/// In-process FIFO queue.
#[derive(Default)]
pub struct InMemoryJobQueue {
    jobs: Mutex<VecDeque<ScanRequest>>,
    available: Notify,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, request: &ScanRequest) -> Result<(), JobQueueError> {
        self.jobs.lock().await.push_back(request.clone());
        self.available.notify_one();
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<ScanRequest>, JobQueueError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.available.notified();
            if let Some(request) = self.jobs.lock().await.pop_front() {
                return Ok(Some(request));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn depth(&self) -> Result<u64, JobQueueError> {
        Ok(self.len().await as u64)
    }
}
