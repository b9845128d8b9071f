//! Seed sources: the entity identifiers the fan-out flows crawl
//!
//! A seed source pages through an external catalog by offset. An empty batch
//! means the catalog is exhausted.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use crate::output::{ClickHouseClient, OutputError};
use crate::Result;

/// Source of seed identifiers
#[async_trait]
pub trait SeedSource: Send + Sync {
    /// Short source name for log lines
    fn name(&self) -> &str;

    /// Raw query for rows `offset..offset + limit`
    async fn query_identifiers(&self, offset: u64, limit: u64) -> Result<Vec<u64>>;

    /// Ordered, de-duplicated identifiers for one window
    ///
    /// Query failures are logged and reported as an empty batch, which the
    /// caller cannot tell apart from an exhausted catalog.
    async fn fetch_identifiers(&self, offset: u64, limit: u64) -> Vec<u64> {
        match self.query_identifiers(offset, limit).await {
            Ok(ids) => {
                let mut seen = HashSet::with_capacity(ids.len());
                let unique: Vec<u64> = ids.into_iter().filter(|id| seen.insert(*id)).collect();
                debug!(
                    source = self.name(),
                    offset,
                    limit,
                    "Fetched {} seed identifiers",
                    unique.len()
                );
                unique
            }
            Err(e) => {
                error!(
                    source = self.name(),
                    offset,
                    limit,
                    "Seed query failed, treating as no seeds: {}",
                    e
                );
                Vec::new()
            }
        }
    }
}

/// Seeds read from a ClickHouse table's `id` column
pub struct ClickHouseSeedSource {
    client: ClickHouseClient,
    table: String,
    order_by: Option<String>,
    label: String,
}

impl ClickHouseSeedSource {
    pub fn new(client: ClickHouseClient, table: impl Into<String>, order_by: Option<String>) -> Self {
        let table = table.into();
        let label = format!("clickhouse:{}.{}", client.database(), table);
        Self {
            client,
            table,
            order_by,
            label,
        }
    }

    /// The SELECT statement for one window, without the FORMAT clause
    pub fn statement(&self, offset: u64, limit: u64) -> String {
        let mut sql = format!("SELECT id FROM {}", self.client.qualified(&self.table));
        if let Some(order_by) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }
        sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
        sql
    }
}

#[async_trait]
impl SeedSource for ClickHouseSeedSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn query_identifiers(&self, offset: u64, limit: u64) -> Result<Vec<u64>> {
        let rows = self.client.query_rows(&self.statement(offset, limit)).await?;

        let ids = rows
            .iter()
            .map(|row| {
                row.get("id").and_then(parse_identifier).ok_or_else(|| {
                    OutputError::Serialization(format!("seed row without a valid id: {:?}", row))
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(ids)
    }
}

/// 64-bit ids arrive as JSON numbers or, by default, as quoted strings
fn parse_identifier(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Fixed in-memory list of seeds
#[derive(Debug, Clone, Default)]
pub struct VecSeedSource {
    ids: Vec<u64>,
}

impl VecSeedSource {
    pub fn new(ids: Vec<u64>) -> Self {
        Self { ids }
    }
}

#[async_trait]
impl SeedSource for VecSeedSource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn query_identifiers(&self, offset: u64, limit: u64) -> Result<Vec<u64>> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(self.ids.iter().skip(start).take(take).copied().collect())
    }
}
