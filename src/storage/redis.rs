//! Redis checkpoint backend
//!
//! Lets several hosts share checkpoints, and keeps the key layout of
//! deployments that already track their progress in Redis.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::traits::{CheckpointBackend, StorageError, StorageResult};

/// Redis-backed checkpoint storage.
pub struct RedisCheckpointBackend {
    conn: Mutex<Option<ConnectionManager>>,
}

impl RedisCheckpointBackend {
    /// Connect to Redis.
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379/0")
    pub async fn new(redis_url: &str) -> StorageResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StorageError::Database(format!("Redis connection error: {}", e)))?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            StorageError::Database(format!("Redis connection manager error: {}", e))
        })?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// A handle on the shared connection; fails once closed
    fn connection(&self) -> StorageResult<ConnectionManager> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| StorageError::Database("redis connection lock poisoned".to_string()))?;
        guard
            .clone()
            .ok_or_else(|| StorageError::Database("checkpoint store is closed".to_string()))
    }
}

#[async_trait]
impl CheckpointBackend for RedisCheckpointBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let mut conn = self.connection()?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut conn = self.connection()?;
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn hget_all(&self, key: &str) -> StorageResult<HashMap<String, String>> {
        let mut conn = self.connection()?;
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> StorageResult<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection()?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (field, value) in fields {
            pipe.hset(key, *field, value.as_str());
        }
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| StorageError::Database("redis connection lock poisoned".to_string()))?;
        // The multiplexed connection shuts down when its last handle drops
        guard.take();
        Ok(())
    }
}
