//! Run statistics
//!
//! Counters shared by every worker of a run, summarized when the run ends.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

/// Live counters for one harvest run
#[derive(Debug, Default)]
pub struct HarvestStats {
    pages: AtomicU64,
    rows_written: AtomicU64,
    rows_dropped: AtomicU64,
    targets_done: AtomicU64,
    targets_failed: AtomicU64,
    targets_interrupted: AtomicU64,
    batches: AtomicU64,
}

/// Point-in-time copy of [`HarvestStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Pages fetched and handed to the writer
    pub pages: u64,

    /// Rows the store accepted
    pub rows_written: u64,

    /// Rows lost to failed bulk appends
    pub rows_dropped: u64,

    /// Pagination streams that ran to their last page
    pub targets_done: u64,

    /// Pagination streams abandoned after a fatal fetch error
    pub targets_failed: u64,

    /// Pagination streams stopped by shutdown
    pub targets_interrupted: u64,

    /// Seed batches fully processed
    pub batches: u64,
}

impl HarvestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_page(&self) {
        self.pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_written(&self, rows: u64) {
        self.rows_written.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, rows: u64) {
        self.rows_dropped.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn record_target_done(&self) {
        self.targets_done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_target_failed(&self) {
        self.targets_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_target_interrupted(&self) {
        self.targets_interrupted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pages: self.pages.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            rows_dropped: self.rows_dropped.load(Ordering::Relaxed),
            targets_done: self.targets_done.load(Ordering::Relaxed),
            targets_failed: self.targets_failed.load(Ordering::Relaxed),
            targets_interrupted: self.targets_interrupted.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Percentage of rows that reached the store
    pub fn write_rate(&self) -> f64 {
        let total = self.rows_written + self.rows_dropped;
        if total == 0 {
            return 100.0;
        }
        (self.rows_written as f64 / total as f64) * 100.0
    }

    /// Logs the end-of-run summary
    pub fn log_summary(&self, flow: &str) {
        info!("=== Harvest summary ({}) ===", flow);
        info!("  Pages fetched: {}", self.pages);
        info!(
            "  Rows written: {} (dropped: {}, {:.1}% stored)",
            self.rows_written,
            self.rows_dropped,
            self.write_rate()
        );
        info!(
            "  Targets done: {}, failed: {}, interrupted: {}",
            self.targets_done, self.targets_failed, self.targets_interrupted
        );
        info!("  Seed batches completed: {}", self.batches);
    }
}
