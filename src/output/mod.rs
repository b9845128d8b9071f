//! Output module: where harvested rows go
//!
//! This module handles:
//! - The append-only row sink abstraction and its ClickHouse implementation
//! - Transforming pages and bulk-appending them (the batch writer)
//! - Run statistics and the end-of-run summary

mod clickhouse;
mod memory;
pub mod stats;
mod traits;
mod writer;

pub use clickhouse::ClickHouseClient;
pub use memory::MemorySink;
pub use stats::{HarvestStats, StatsSnapshot};
pub use traits::{OutputError, OutputResult, RowSink};
pub use writer::BatchWriter;
