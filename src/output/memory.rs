//! In-memory row sink
//!
//! Keeps inserted rows per table, for embedding and for tests that need to
//! inspect exactly what a crawl wrote.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::traits::{OutputError, OutputResult, RowSink};

#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<HashMap<String, Vec<Map<String, Value>>>>,
    failing: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent insert fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Rows appended to `table` so far, in insertion order
    pub fn rows(&self, table: &str) -> Vec<Map<String, Value>> {
        self.tables
            .lock()
            .map(|tables| tables.get(table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn total_rows(&self) -> usize {
        self.tables
            .lock()
            .map(|tables| tables.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RowSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(
        &self,
        table: &str,
        _columns: &[&str],
        rows: &[Map<String, Value>],
    ) -> OutputResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(OutputError::Connection("memory sink set to fail".to_string()));
        }

        let mut tables = self
            .tables
            .lock()
            .map_err(|_| OutputError::Connection("memory sink lock poisoned".to_string()))?;
        tables
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(())
    }
}
