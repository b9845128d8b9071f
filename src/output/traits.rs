//! Row sink trait and error types
//!
//! A sink is the append-only analytical store the harvested rows end up in.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur while talking to the analytical store
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Store connection failed: {0}")]
    Connection(String),

    #[error("Store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to encode or decode rows: {0}")]
    Serialization(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for append-only row stores
///
/// Implementations must be thread-safe; every follower shares one sink.
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Short sink name for log lines
    fn name(&self) -> &'static str;

    /// Appends `rows` to `table` in one bulk request
    ///
    /// # Arguments
    ///
    /// * `table` - Unqualified table name
    /// * `columns` - Explicit column list, in the table's declared order
    /// * `rows` - One JSON object per row, keyed by column name
    async fn insert(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Map<String, Value>],
    ) -> OutputResult<()>;
}
