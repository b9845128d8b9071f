//! Checkpoint backend trait and error types
//!
//! A backend is a small durable key/value store offering scalar get/set and
//! hash (named fields) get/set. The typed checkpoints in
//! [`checkpoint`](super::checkpoint) are built on top of it.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during checkpoint storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Corrupt checkpoint '{key}': {message}")]
    Corrupt { key: String, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for durable checkpoint backends
///
/// Writes are last-writer-wins. One crawl owns a given key, so no
/// cross-writer coordination is provided.
#[async_trait]
pub trait CheckpointBackend: Send + Sync {
    /// Short backend name for log lines
    fn name(&self) -> &'static str;

    /// Reads a scalar value
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Overwrites a scalar value
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Reads every field of a hash; empty when the key is absent
    async fn hget_all(&self, key: &str) -> StorageResult<HashMap<String, String>>;

    /// Writes the given fields of a hash in one atomic step
    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> StorageResult<()>;

    /// Releases the underlying connection; every later call fails
    async fn close(&self) -> StorageResult<()>;
}
