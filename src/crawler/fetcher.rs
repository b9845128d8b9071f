//! HTTP fetcher implementation
//!
//! This module handles all API requests, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - Fetching and decoding one page of a collection
//! - Classifying failures as transient or not
//! - Retrying transient failures on the backoff schedule

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::retry::RetryPolicy;
use crate::config::ApiConfig;

/// One page of a cursor-paginated collection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page {
    /// Raw records, in API order; absent or null means none
    #[serde(default, deserialize_with = "null_as_empty")]
    pub collection: Vec<Value>,

    /// Cursor to the next page, absent on the last one
    #[serde(default)]
    pub next_href: Option<String>,
}

impl Page {
    /// The cursor, if it points anywhere
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_href
            .as_deref()
            .map(str::trim)
            .filter(|href| !href.is_empty())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Why a page could not be fetched
///
/// | Condition | Class |
/// |-----------|-------|
/// | HTTP 2xx with a JSON object body | success |
/// | HTTP 5xx | transient |
/// | Connect error, timeout, body read error | transient |
/// | Any other non-2xx status | rejected |
/// | Body is not a page object | decode |
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transient failure fetching {url}: {reason}")]
    Transient { url: String, reason: String },

    #[error("{url} returned HTTP {status}")]
    Rejected {
        url: String,
        status: u16,
        body: String,
    },

    #[error("undecodable page at {url}: {message}")]
    Decode { url: String, message: String },

    #[error("gave up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },

    #[error("fetch of {url} cancelled")]
    Cancelled { url: String },
}

impl FetchError {
    /// Returns true if another attempt may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns true if the fetch was abandoned because of shutdown
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use harvester::config::ApiConfig;
/// use harvester::crawler::build_http_client;
///
/// let client = build_http_client(&ApiConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Page fetcher with a retry budget
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, retry: RetryPolicy) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: build_http_client(config)?,
            retry,
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Performs a single attempt
    pub async fn fetch_page(&self, url: &Url) -> Result<Page, FetchError> {
        let response = self.http.get(url.clone()).send().await.map_err(|e| {
            FetchError::Transient {
                url: url.to_string(),
                reason: describe_transport_error(&e),
            }
        })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(FetchError::Transient {
                url: url.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Rejected {
                url: url.to_string(),
                status: status.as_u16(),
                body: truncate(&body, 512),
            });
        }

        let body = response.bytes().await.map_err(|e| FetchError::Transient {
            url: url.to_string(),
            reason: format!("failed to read body: {}", e),
        })?;

        serde_json::from_slice::<Page>(&body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Fetches a page, retrying transient failures
    ///
    /// Makes at most `max_attempts` attempts and sleeps between them, never
    /// after the last one. Shutdown during a backoff sleep abandons the fetch
    /// with [`FetchError::Cancelled`].
    pub async fn fetch_page_with_retry(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<Page, FetchError> {
        let mut backoff = self.retry.backoff();
        let mut attempt = 1;

        loop {
            match self.fetch_page(url).await {
                Ok(page) => return Ok(page),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= self.retry.max_attempts => {
                    return Err(FetchError::Exhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = backoff.next_delay(&mut rand::rng());
                    warn!(
                        url = %url,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        "{}; retrying in {:?}",
                        e,
                        delay
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!(url = %url, "Backoff interrupted by shutdown");
                            return Err(FetchError::Cancelled { url: url.to_string() });
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("timed out: {}", error)
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
