//! Batch writer: transform a page of raw records and bulk-append them

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error};

use super::stats::HarvestStats;
use super::traits::RowSink;
use crate::transform::{transform, Schema};

/// Appends transformed pages to one table
///
/// Best-effort: a failed bulk append is logged with the table name and batch
/// size, counted as dropped and discarded. The caller carries on.
#[derive(Clone)]
pub struct BatchWriter {
    sink: Arc<dyn RowSink>,
    table: String,
    schema: Schema,
    stats: Arc<HarvestStats>,
}

impl BatchWriter {
    pub fn new(
        sink: Arc<dyn RowSink>,
        table: impl Into<String>,
        schema: Schema,
        stats: Arc<HarvestStats>,
    ) -> Self {
        Self {
            sink,
            table: table.into(),
            schema,
            stats,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Transforms and appends one page worth of records
    ///
    /// Returns the number of rows the store accepted.
    pub async fn append(&self, records: &[Value]) -> u64 {
        if records.is_empty() {
            return 0;
        }

        let rows: Vec<Map<String, Value>> = records
            .iter()
            .map(|record| transform(record, &self.schema).to_json_object(&self.schema))
            .collect();
        let count = rows.len() as u64;
        let columns = self.schema.column_names();

        match self.sink.insert(&self.table, &columns, &rows).await {
            Ok(()) => {
                debug!(table = %self.table, rows = count, "Appended rows");
                self.stats.record_written(count);
                count
            }
            Err(e) => {
                error!(
                    table = %self.table,
                    rows = count,
                    sink = self.sink.name(),
                    "Bulk append failed, dropping batch: {}",
                    e
                );
                self.stats.record_dropped(count);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemorySink;
    use crate::transform::USER_SCHEMA;
    use serde_json::json;

    fn writer(sink: Arc<MemorySink>, stats: Arc<HarvestStats>) -> BatchWriter {
        BatchWriter::new(sink, "users", USER_SCHEMA, stats)
    }

    #[tokio::test]
    async fn test_append_writes_one_row_per_record() {
        let sink = Arc::new(MemorySink::new());
        let stats = Arc::new(HarvestStats::new());
        let writer = writer(sink.clone(), stats.clone());

        let written = writer
            .append(&[json!({"id": 1, "username": "a"}), json!({"id": 2})])
            .await;

        assert_eq!(written, 2);
        let rows = sink.rows("users");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["username"], json!("a"));
        assert_eq!(rows[1]["username"], json!(""));
        assert_eq!(rows[0].len(), USER_SCHEMA.len());
        assert_eq!(stats.snapshot().rows_written, 2);
    }

    #[tokio::test]
    async fn test_failed_append_is_dropped_not_raised() {
        let sink = Arc::new(MemorySink::new());
        sink.set_failing(true);
        let stats = Arc::new(HarvestStats::new());
        let writer = writer(sink.clone(), stats.clone());

        let written = writer
            .append(&[json!({"id": 1}), json!({"id": 2}), json!({"id": 3})])
            .await;

        assert_eq!(written, 0);
        assert_eq!(sink.total_rows(), 0);
        assert_eq!(stats.snapshot().rows_dropped, 3);
    }

    #[tokio::test]
    async fn test_empty_page_writes_nothing() {
        let sink = Arc::new(MemorySink::new());
        let stats = Arc::new(HarvestStats::new());

        assert_eq!(writer(sink.clone(), stats).append(&[]).await, 0);
        assert_eq!(sink.total_rows(), 0);
    }
}
