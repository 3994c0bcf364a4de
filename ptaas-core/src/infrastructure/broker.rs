//! Redis-compatible broker
//!
//! Backs both the durable job queue (a list consumed with `BRPOP`) and the
//! published job states (one JSON document per key, written with a single
//! `SET ... EX` so readers never see a partial update).

use std::sync::Arc;
use std::time::Duration;

use redis::Client;
use redis::aio::ConnectionManager;
use tracing::{debug, error};

/// Broker operation errors
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Broker connection failed: {0}")]
    Connection(String),

    #[error("Broker {command} failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },

    #[error("Broker payload (de)serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BrokerError {
    fn command(command: &'static str, err: redis::RedisError) -> Self {
        Self::Command {
            command,
            message: err.to_string(),
        }
    }
}

/// Thin async wrapper over a multiplexed, auto-reconnecting connection
#[derive(Clone)]
pub struct RedisBroker {
    connection_manager: Arc<ConnectionManager>,
}

impl RedisBroker {
    /// Connect and verify the broker answers `PING`.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let client = Client::open(url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            BrokerError::Connection(e.to_string())
        })?;

        let connection_manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to create connection manager: {}", e);
            BrokerError::Connection(e.to_string())
        })?;

        let broker = Self {
            connection_manager: Arc::new(connection_manager),
        };
        broker.ping().await?;

        debug!("Connected to broker at {}", url);
        Ok(broker)
    }

    fn connection(&self) -> ConnectionManager {
        (*self.connection_manager).clone()
    }

    pub async fn ping(&self) -> Result<(), BrokerError> {
        let mut conn = self.connection();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| BrokerError::command("PING", e))?;
        Ok(())
    }

    /// Push a value to the head of a list
    pub async fn lpush<T>(&self, key: &str, value: &T) -> Result<(), BrokerError>
    where
        T: serde::Serialize + Send + Sync,
    {
        let mut conn = self.connection();
        let json_value = serde_json::to_string(value)?;

        redis::cmd("LPUSH")
            .arg(key)
            .arg(json_value)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| {
                error!("Failed to LPUSH to key {}: {}", key, e);
                BrokerError::command("LPUSH", e)
            })?;

        Ok(())
    }

    /// Pop a value from the tail of a list, blocking until available or timed out
    pub async fn brpop<T>(&self, key: &str, timeout: Duration) -> Result<Option<T>, BrokerError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        let mut conn = self.connection();

        // BRPOP returns [key, value] or nil on timeout
        let result: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(key)
            .arg(timeout.as_secs_f64())
            .query_async::<Option<(String, String)>>(&mut conn)
            .await
            .map_err(|e| {
                error!("Failed to BRPOP from key {}: {}", key, e);
                BrokerError::command("BRPOP", e)
            })?;

        match result {
            Some((_, value_str)) => Ok(Some(serde_json::from_str(&value_str)?)),
            None => Ok(None),
        }
    }

    /// Number of entries waiting in a list
    pub async fn llen(&self, key: &str) -> Result<u64, BrokerError> {
        let mut conn = self.connection();
        redis::cmd("LLEN")
            .arg(key)
            .query_async::<u64>(&mut conn)
            .await
            .map_err(|e| BrokerError::command("LLEN", e))
    }

    /// Store a JSON document with an expiry
    pub async fn set_json<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), BrokerError>
    where
        T: serde::Serialize + Send + Sync,
    {
        let mut conn = self.connection();
        let payload = serde_json::to_vec(value)?;

        redis::cmd("SET")
            .arg(key)
            .arg(payload)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| {
                error!("Failed to SET key {}: {}", key, e);
                BrokerError::command("SET", e)
            })?;

        Ok(())
    }

    /// Load a JSON document, `None` when the key is absent or expired
    pub async fn get_json<T>(&self, key: &str) -> Result<Option<T>, BrokerError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        let mut conn = self.connection();

        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async::<Option<Vec<u8>>>(&mut conn)
            .await
            .map_err(|e| BrokerError::command("GET", e))?;

        match value {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => {
                debug!("Broker key not found: {}", key);
                Ok(None)
            }
        }
    }
}
