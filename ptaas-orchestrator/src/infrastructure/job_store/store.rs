use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use ptaas_core::infrastructure::{BrokerError, RedisBroker};

use super::snapshot::JobSnapshot;
use crate::domain::errors::ScanError;

/// Job persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("Serialization failed: {0}")]
    Serialization(String),
    #[error("Broker operation failed: {0}")]
    Broker(String),
}

impl From<BrokerError> for JobStoreError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::Serialization(e) => Self::Serialization(e.to_string()),
            other => Self::Broker(other.to_string()),
        }
    }
}

impl From<JobStoreError> for ScanError {
    fn from(err: JobStoreError) -> Self {
        ScanError::Store(err.to_string())
    }
}

/// Job state storage interface.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Replace the published state of a job in one write
    async fn save_snapshot(&self, snapshot: JobSnapshot) -> Result<(), JobStoreError>;
    async fn get_snapshot(&self, job_id: Uuid) -> Result<Option<JobSnapshot>, JobStoreError>;
}

/// Redis-backed job store with a TTL on every state document.
pub struct RedisJobStore {
    broker: RedisBroker,
    ttl: Duration,
}

impl RedisJobStore {
    pub fn new(broker: RedisBroker, ttl: Duration) -> Self {
        Self { broker, ttl }
    }

    fn job_key(job_id: Uuid) -> String {
        format!("ptaas:job:{}", job_id)
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn save_snapshot(&self, snapshot: JobSnapshot) -> Result<(), JobStoreError> {
        let key = Self::job_key(snapshot.job_id);
        self.broker.set_json(&key, &snapshot, self.ttl).await?;

        tracing::debug!(
            job_id = %snapshot.job_id,
            state = snapshot.state.label(),
            "Job state published"
        );

        Ok(())
    }

    async fn get_snapshot(&self, job_id: Uuid) -> Result<Option<JobSnapshot>, JobStoreError> {
        let key = Self::job_key(job_id);
        Ok(self.broker.get_json::<JobSnapshot>(&key).await?)
    }
}

/// Process-local job store for the in-memory queue backend.
///
/// Snapshots expire lazily on read once older than the TTL.
#[derive(Clone)]
pub struct InMemoryJobStore {
    snapshots: Arc<RwLock<HashMap<Uuid, (JobSnapshot, tokio::time::Instant)>>>,
    ttl: Duration,
}

impl InMemoryJobStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            snapshots: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(24 * 60 * 60))
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn save_snapshot(&self, snapshot: JobSnapshot) -> Result<(), JobStoreError> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.job_id, (snapshot, tokio::time::Instant::now()));
        Ok(())
    }

    async fn get_snapshot(&self, job_id: Uuid) -> Result<Option<JobSnapshot>, JobStoreError> {
        let mut snapshots = self.snapshots.write().await;
        match snapshots.get(&job_id) {
            Some((_, written_at)) if written_at.elapsed() > self.ttl => {
                snapshots.remove(&job_id);
                Ok(None)
            }
            Some((snapshot, _)) => Ok(Some(snapshot.clone())),
            None => Ok(None),
        }
    }
}
