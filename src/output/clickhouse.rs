//! ClickHouse client over the HTTP interface
//!
//! Rows go in as `INSERT ... FORMAT JSONEachRow` request bodies; query results
//! come back as `JSONEachRow` lines.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde_json::{Map, Value};
use tracing::debug;

use super::traits::{OutputError, OutputResult, RowSink};
use crate::config::ClickHouseConfig;

/// ClickHouse HTTP client, shared by the batch writer and the seed source
#[derive(Clone)]
pub struct ClickHouseClient {
    http: reqwest::Client,
    config: ClickHouseConfig,
}

impl fmt::Debug for ClickHouseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClickHouseClient")
            .field("url", &self.config.url)
            .field("database", &self.config.database)
            .finish()
    }
}

impl ClickHouseClient {
    /// Creates a client; no connection is made until the first request
    pub fn new(config: &ClickHouseConfig, timeout: Duration) -> OutputResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OutputError::Connection(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    pub fn database(&self) -> &str {
        &self.config.database
    }

    /// Fully qualified, quoted table name
    pub fn qualified(&self, table: &str) -> String {
        format!("`{}`.`{}`", self.config.database, table)
    }

    fn request(&self, method: Method, query: &str) -> RequestBuilder {
        let endpoint = format!("{}/", self.config.url.trim_end_matches('/'));
        let mut request = self
            .http
            .request(method, endpoint)
            .query(&[("database", self.config.database.as_str()), ("query", query)]);

        if let Some(user) = &self.config.username {
            request = request.basic_auth(user, self.config.password.as_ref());
        }

        request
    }

    async fn send(&self, request: RequestBuilder) -> OutputResult<String> {
        let response = request
            .send()
            .await
            .map_err(|e| OutputError::Connection(format!("ClickHouse request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OutputError::Connection(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(OutputError::Rejected {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        Ok(body)
    }

    /// Runs a SELECT and returns its rows as JSON objects
    pub async fn query_rows(&self, sql: &str) -> OutputResult<Vec<Map<String, Value>>> {
        let sql = format!("{} FORMAT JSONEachRow", sql.trim().trim_end_matches(';'));
        debug!("ClickHouse query: {}", sql);

        let body = self.send(self.request(Method::GET, &sql)).await?;

        body.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    OutputError::Serialization(format!("failed to parse JSON row: {}", e))
                })
            })
            .collect()
    }
}

#[async_trait]
impl RowSink for ClickHouseClient {
    fn name(&self) -> &'static str {
        "clickhouse"
    }

    async fn insert(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Map<String, Value>],
    ) -> OutputResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let column_list = columns
            .iter()
            .map(|c| format!("`{}`", c))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = format!(
            "INSERT INTO {} ({}) FORMAT JSONEachRow",
            self.qualified(table),
            column_list
        );

        let mut body = String::new();
        for row in rows {
            let line = serde_json::to_string(row)
                .map_err(|e| OutputError::Serialization(e.to_string()))?;
            body.push_str(&line);
            body.push('\n');
        }

        let max_partitions = self.config.max_partitions_per_insert_block.to_string();
        let request = self
            .request(Method::POST, &statement)
            .query(&[("max_partitions_per_insert_block", max_partitions.as_str())])
            .body(body);

        self.send(request).await?;
        debug!("Inserted {} rows into {}", rows.len(), table);
        Ok(())
    }
}
