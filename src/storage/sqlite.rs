//! SQLite checkpoint backend
//!
//! The default, single-host backend: checkpoints live in a local database file
//! next to the crawler.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CheckpointBackend, StorageError, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite checkpoint backend
///
/// The connection is taken out on [`close`](CheckpointBackend::close); every
/// later call fails.
pub struct SqliteCheckpointBackend {
    conn: Mutex<Option<Connection>>,
}

impl SqliteCheckpointBackend {
    /// Opens (or creates) the checkpoint database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Creates an in-memory database, for tests and dry runs
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("checkpoint connection lock poisoned".to_string()))
    }
}

fn connected(guard: &mut Option<Connection>) -> StorageResult<&mut Connection> {
    guard
        .as_mut()
        .ok_or_else(|| StorageError::Database("checkpoint store is closed".to_string()))
}

#[async_trait]
impl CheckpointBackend for SqliteCheckpointBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let mut guard = self.lock()?;
        let value = connected(&mut guard)?
            .query_row(
                "SELECT value FROM checkpoints WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let mut guard = self.lock()?;
        connected(&mut guard)?.execute(
            "INSERT INTO checkpoints (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    async fn hget_all(&self, key: &str) -> StorageResult<HashMap<String, String>> {
        let mut guard = self.lock()?;
        let mut stmt = connected(&mut guard)?
            .prepare("SELECT field, value FROM checkpoint_fields WHERE key = ?1")?;

        let fields = stmt
            .query_map(params![key], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(fields)
    }

    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let mut guard = self.lock()?;
        let tx = connected(&mut guard)?.transaction()?;
        for (field, value) in fields {
            tx.execute(
                "INSERT INTO checkpoint_fields (key, field, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key, field) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, field, value, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        let conn = self.lock()?.take();
        match conn {
            Some(conn) => conn.close().map_err(|(_, e)| StorageError::Sqlite(e)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_scalar_roundtrip_and_overwrite() {
        let backend = SqliteCheckpointBackend::in_memory().unwrap();

        assert_eq!(backend.get("cursor").await.unwrap(), None);

        backend.set("cursor", "https://api.example.com/a").await.unwrap();
        backend.set("cursor", "https://api.example.com/b").await.unwrap();

        assert_eq!(
            backend.get("cursor").await.unwrap().as_deref(),
            Some("https://api.example.com/b")
        );
    }

    #[tokio::test]
    async fn test_hash_fields() {
        let backend = SqliteCheckpointBackend::in_memory().unwrap();

        assert!(backend.hget_all("pos").await.unwrap().is_empty());

        backend
            .hset("pos", &[("offset", "0".to_string()), ("limit", "1000".to_string())])
            .await
            .unwrap();
        backend.hset("pos", &[("offset", "1000".to_string())]).await.unwrap();

        let fields = backend.hget_all("pos").await.unwrap();
        assert_eq!(fields.get("offset").map(String::as_str), Some("1000"));
        assert_eq!(fields.get("limit").map(String::as_str), Some("1000"));
        assert!(backend.hget_all("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_backend_rejects_use() {
        let backend = SqliteCheckpointBackend::in_memory().unwrap();
        backend.set("cursor", "page-2").await.unwrap();

        backend.close().await.unwrap();
        backend.close().await.unwrap();

        assert!(matches!(
            backend.get("cursor").await,
            Err(StorageError::Database(_))
        ));
        assert!(backend.set("cursor", "page-3").await.is_err());
        assert!(backend.hget_all("pos").await.is_err());
        assert!(backend
            .hset("pos", &[("offset", "1".to_string())])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_checkpoints_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoints.db");

        {
            let backend = SqliteCheckpointBackend::new(&path).unwrap();
            backend.set("cursor", "next-page").await.unwrap();
            backend.hset("pos", &[("offset", "42".to_string())]).await.unwrap();
            backend.close().await.unwrap();
        }

        let reopened = SqliteCheckpointBackend::new(&path).unwrap();
        assert_eq!(reopened.get("cursor").await.unwrap().as_deref(), Some("next-page"));
        assert_eq!(
            reopened.hget_all("pos").await.unwrap().get("offset").map(String::as_str),
            Some("42")
        );
    }
}
