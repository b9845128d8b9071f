//! Checkpoint storage
//!
//! This module persists crawl progress so an interrupted run resumes where
//! the last completed unit of work ended:
//! - A backend trait with SQLite (local file) and Redis implementations
//! - Typed cursor and `{offset, limit}` checkpoints on top of it

mod checkpoint;
mod redis;
mod schema;
mod sqlite;
mod traits;

pub use self::redis::RedisCheckpointBackend;
pub use checkpoint::{CursorCheckpoint, CursorPosition, OffsetCheckpoint, OffsetLimit};
pub use sqlite::SqliteCheckpointBackend;
pub use traits::{CheckpointBackend, StorageError, StorageResult};

use crate::config::{CheckpointBackendKind, CheckpointConfig};

use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Opens the checkpoint backend selected by the configuration
pub async fn open_backend(config: &CheckpointConfig) -> StorageResult<Arc<dyn CheckpointBackend>> {
    match config.backend {
        CheckpointBackendKind::Sqlite => {
            info!("Opening SQLite checkpoints at {}", config.path);
            Ok(Arc::new(SqliteCheckpointBackend::new(Path::new(&config.path))?))
        }
        CheckpointBackendKind::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                StorageError::Database("redis backend selected without redis-url".to_string())
            })?;
            info!("Connecting to Redis checkpoints");
            Ok(Arc::new(RedisCheckpointBackend::new(url).await?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_sqlite_backend() {
        let dir = tempdir().unwrap();
        let config = CheckpointConfig {
            backend: CheckpointBackendKind::Sqlite,
            path: dir.path().join("state.db").to_string_lossy().into_owned(),
            redis_url: None,
        };

        let backend = open_backend(&config).await.unwrap();
        assert_eq!(backend.name(), "sqlite");
        assert!(dir.path().join("state.db").exists());
    }

    #[tokio::test]
    async fn test_redis_backend_requires_url() {
        let config = CheckpointConfig {
            backend: CheckpointBackendKind::Redis,
            path: "unused.db".to_string(),
            redis_url: None,
        };

        assert!(open_backend(&config).await.is_err());
    }
}
