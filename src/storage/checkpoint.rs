//! Typed checkpoints over a [`CheckpointBackend`]
//!
//! Two shapes are stored: an opaque cursor URL for a single paginated stream,
//! and an `{offset, limit}` pair describing the next window of seed
//! identifiers. Loading propagates backend failures so a crawl never restarts
//! from scratch by accident; saving logs and swallows them so a transient
//! store outage costs at most some re-fetching.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error};

use super::traits::{CheckpointBackend, StorageError, StorageResult};

const OFFSET_FIELD: &str = "offset";
const LIMIT_FIELD: &str = "limit";

/// Position of a single cursor-paginated stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorPosition {
    /// Nothing saved yet
    Fresh,
    /// Resume from this page URL
    At(String),
    /// The stream ran to completion
    Exhausted,
}

impl fmt::Display for CursorPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorPosition::Fresh => write!(f, "fresh"),
            CursorPosition::At(url) => write!(f, "at {}", url),
            CursorPosition::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Window of seed identifiers: rows `offset..offset + limit` of the seed query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetLimit {
    pub offset: u64,
    pub limit: u64,
}

impl OffsetLimit {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// The window directly after this one, same size
    pub fn advance(self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.limit),
            limit: self.limit,
        }
    }
}

impl fmt::Display for OffsetLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{offset: {}, limit: {}}}", self.offset, self.limit)
    }
}

/// Cursor checkpoint stored as a scalar under one key
///
/// The empty string is the exhausted marker.
#[derive(Clone)]
pub struct CursorCheckpoint {
    backend: Arc<dyn CheckpointBackend>,
    key: String,
}

impl CursorCheckpoint {
    pub fn new(backend: Arc<dyn CheckpointBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn load(&self) -> StorageResult<CursorPosition> {
        let position = match self.backend.get(&self.key).await? {
            None => CursorPosition::Fresh,
            Some(value) if value.is_empty() => CursorPosition::Exhausted,
            Some(value) => CursorPosition::At(value),
        };
        debug!("Loaded cursor checkpoint {}: {}", self.key, position);
        Ok(position)
    }

    /// Records the next page URL, or `None` once the stream is done
    pub async fn save(&self, next: Option<&str>) {
        let value = next.unwrap_or("");
        if let Err(e) = self.backend.set(&self.key, value).await {
            error!(
                "Failed to save cursor checkpoint {} ({} backend): {}",
                self.key,
                self.backend.name(),
                e
            );
        }
    }
}

/// `{offset, limit}` checkpoint stored as a hash under one key
#[derive(Clone)]
pub struct OffsetCheckpoint {
    backend: Arc<dyn CheckpointBackend>,
    key: String,
}

impl OffsetCheckpoint {
    pub fn new(backend: Arc<dyn CheckpointBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Loads the saved window, or `None` when nothing was saved
    ///
    /// A saved `limit` is honored even if the configured batch size changed
    /// since, so the windows already processed stay contiguous.
    pub async fn load(&self) -> StorageResult<Option<OffsetLimit>> {
        let fields = self.backend.hget_all(&self.key).await?;
        if fields.is_empty() {
            debug!("No offset checkpoint under {}", self.key);
            return Ok(None);
        }

        let offset = self.parse_field(fields.get(OFFSET_FIELD), OFFSET_FIELD)?;
        let limit = self.parse_field(fields.get(LIMIT_FIELD), LIMIT_FIELD)?;
        if limit == 0 {
            return Err(StorageError::Corrupt {
                key: self.key.clone(),
                message: "limit is zero".to_string(),
            });
        }

        let position = OffsetLimit::new(offset, limit);
        debug!("Loaded offset checkpoint {}: {}", self.key, position);
        Ok(Some(position))
    }

    pub async fn save(&self, position: OffsetLimit) {
        let fields = [
            (OFFSET_FIELD, position.offset.to_string()),
            (LIMIT_FIELD, position.limit.to_string()),
        ];
        if let Err(e) = self.backend.hset(&self.key, &fields).await {
            error!(
                "Failed to save offset checkpoint {} = {} ({} backend): {}",
                self.key,
                position,
                self.backend.name(),
                e
            );
        }
    }

    fn parse_field(&self, raw: Option<&String>, field: &str) -> StorageResult<u64> {
        let raw = raw.ok_or_else(|| StorageError::Corrupt {
            key: self.key.clone(),
            message: format!("missing field '{}'", field),
        })?;
        raw.trim().parse().map_err(|_| StorageError::Corrupt {
            key: self.key.clone(),
            message: format!("field '{}' is not a non-negative integer: {:?}", field, raw),
        })
    }
}
