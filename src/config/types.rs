use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub clickhouse: ClickHouseConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub followers: FollowersFlowConfig,
    #[serde(default = "SeededFlowConfig::tracks")]
    pub tracks: SeededFlowConfig,
    #[serde(default = "SeededFlowConfig::snowball")]
    pub snowball: SeededFlowConfig,
}

/// Remote API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApiConfig {
    /// Base URL of the paginated API (e.g. "https://api-v2.soundcloud.com")
    pub base_url: String,

    /// Client/app identity carried on every request
    #[serde(default)]
    pub client_id: String,

    /// Page size requested from the API (`limit` query parameter)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-v2.soundcloud.com".to_string(),
            client_id: String::new(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Crawl scheduling configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum number of concurrently active followers
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Number of seed identifiers fetched per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,

    /// Upper bound of the random delay between two pages of one follower (milliseconds)
    #[serde(default = "default_politeness_jitter")]
    pub politeness_jitter_ms: u64,

    /// Stop fan-out flows once the seed offset passes this value
    #[serde(default)]
    pub max_offset: Option<u64>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            politeness_jitter_ms: default_politeness_jitter(),
            max_offset: None,
        }
    }
}

/// Retry/backoff configuration for API fetches
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Total attempts per fetch, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay (milliseconds)
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Backoff ceiling (milliseconds)
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

/// Analytical store (ClickHouse HTTP interface) configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClickHouseConfig {
    /// HTTP endpoint, e.g. "http://localhost:8123"
    #[serde(default = "default_clickhouse_url")]
    pub url: String,

    /// Database holding the target and seed tables
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Passed as a query setting on every insert
    #[serde(default = "default_max_partitions")]
    pub max_partitions_per_insert_block: u32,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: default_clickhouse_url(),
            database: default_database(),
            username: None,
            password: None,
            max_partitions_per_insert_block: default_max_partitions(),
        }
    }
}

/// Which durable backend holds checkpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackendKind {
    Sqlite,
    Redis,
}

/// Checkpoint backend configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CheckpointConfig {
    #[serde(default = "default_backend")]
    pub backend: CheckpointBackendKind,

    /// SQLite file used by the `sqlite` backend
    #[serde(default = "default_checkpoint_path")]
    pub path: String,

    /// Connection URL used by the `redis` backend
    #[serde(default)]
    pub redis_url: Option<String>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_checkpoint_path(),
            redis_url: None,
        }
    }
}

/// The single-stream followers flow
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FollowersFlowConfig {
    /// User whose followers collection is harvested
    #[serde(default = "default_followers_user")]
    pub user_id: u64,

    #[serde(default = "default_followers_table")]
    pub table: String,

    /// Key of the cursor checkpoint
    #[serde(default = "default_followers_key")]
    pub checkpoint_key: String,

    /// Query parameters required on every page besides client id and page size
    #[serde(default)]
    pub extra_params: BTreeMap<String, String>,
}

impl Default for FollowersFlowConfig {
    fn default() -> Self {
        Self {
            user_id: default_followers_user(),
            table: default_followers_table(),
            checkpoint_key: default_followers_key(),
            extra_params: BTreeMap::new(),
        }
    }
}

/// A fan-out flow driven by seed identifiers (`tracks` and `snowball`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SeededFlowConfig {
    /// Table the harvested rows are appended to
    pub table: String,

    /// Table the seed identifiers are read from
    pub seed_table: String,

    /// Optional ORDER BY clause for the seed query
    #[serde(default)]
    pub seed_order_by: Option<String>,

    /// Key of the `{offset, limit}` checkpoint
    pub checkpoint_key: String,

    /// Seed offset used when no checkpoint exists
    #[serde(default)]
    pub start_offset: u64,

    /// Query parameters required on every page besides client id and page size
    #[serde(default)]
    pub extra_params: BTreeMap<String, String>,
}

impl SeededFlowConfig {
    /// Defaults for the per-user tracks flow
    pub fn tracks() -> Self {
        Self {
            table: "tracks".to_string(),
            seed_table: "users".to_string(),
            seed_order_by: None,
            checkpoint_key: "harvester:tracks:offset".to_string(),
            start_offset: 0,
            extra_params: BTreeMap::new(),
        }
    }

    /// Defaults for the follower snowball flow
    pub fn snowball() -> Self {
        let mut extra_params = BTreeMap::new();
        extra_params.insert("linked_partitioning".to_string(), "1".to_string());
        extra_params.insert("app_locale".to_string(), "en".to_string());
        Self {
            table: "users".to_string(),
            seed_table: "users".to_string(),
            seed_order_by: Some("created_at DESC".to_string()),
            checkpoint_key: "harvester:snowball:offset_limit".to_string(),
            start_offset: 0,
            extra_params,
        }
    }
}

fn default_page_size() -> u32 {
    100
}

fn default_request_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("harvester/{}", env!("CARGO_PKG_VERSION"))
}

fn default_concurrency() -> u32 {
    16
}

fn default_batch_size() -> u64 {
    1000
}

fn default_politeness_jitter() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    15_000
}

fn default_clickhouse_url() -> String {
    "http://localhost:8123".to_string()
}

fn default_database() -> String {
    "default".to_string()
}

fn default_max_partitions() -> u32 {
    1000
}

fn default_backend() -> CheckpointBackendKind {
    CheckpointBackendKind::Sqlite
}

fn default_checkpoint_path() -> String {
    "./harvester-checkpoints.db".to_string()
}

fn default_followers_user() -> u64 {
    193
}

fn default_followers_table() -> String {
    "followers".to_string()
}

fn default_followers_key() -> String {
    "harvester:followers:last_url".to_string()
}
