//! Harvester: a resumable collection crawler
//!
//! This crate follows cursor-paginated collections on a rate-limited remote API,
//! flattens every record into a fixed wide row and bulk-loads the rows into an
//! append-only analytical store, persisting checkpoints so a restart resumes
//! where the last completed unit of work ended.

pub mod config;
pub mod crawler;
pub mod endpoint;
pub mod output;
pub mod seed;
pub mod state;
pub mod storage;
pub mod transform;

use thiserror::Error;

/// Main error type for harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Checkpoint storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Analytical store error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] crawler::FetchError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Flow, Harvester, RunMode};
pub use state::FollowerState;
pub use transform::{transform, Row, Schema};
