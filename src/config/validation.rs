use crate::config::types::{
    ApiConfig, CheckpointBackendKind, CheckpointConfig, ClickHouseConfig, Config, CrawlerConfig,
    FollowersFlowConfig, RetryConfig, SeededFlowConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_clickhouse_config(&config.clickhouse)?;
    validate_checkpoint_config(&config.checkpoint)?;
    validate_followers_flow(&config.followers)?;
    validate_seeded_flow("tracks", &config.tracks)?;
    validate_seeded_flow("snowball", &config.snowball)?;
    Ok(())
}

/// Validates the remote API configuration
///
/// An empty client id is accepted here because it may still be supplied on
/// the command line; the entry point re-checks it before crawling.
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    validate_http_url("api.base-url", &config.base_url)?;

    if config.page_size < 1 || config.page_size > 200 {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and 200, got {}",
            config.page_size
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler scheduling configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 256 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 256, got {}",
            config.concurrency
        )));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch-size must be >= 1, got {}",
            config.batch_size
        )));
    }

    Ok(())
}

/// Validates the retry policy
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "base-delay-ms ({}) cannot exceed max-delay-ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}

/// Validates the analytical store configuration
fn validate_clickhouse_config(config: &ClickHouseConfig) -> Result<(), ConfigError> {
    validate_http_url("clickhouse.url", &config.url)?;
    validate_identifier(&config.database)?;

    if config.password.is_some() && config.username.is_none() {
        return Err(ConfigError::Validation(
            "clickhouse.password requires clickhouse.username".to_string(),
        ));
    }

    Ok(())
}

/// Validates the checkpoint backend configuration
fn validate_checkpoint_config(config: &CheckpointConfig) -> Result<(), ConfigError> {
    match config.backend {
        CheckpointBackendKind::Sqlite => {
            if config.path.is_empty() {
                return Err(ConfigError::Validation(
                    "checkpoint.path cannot be empty for the sqlite backend".to_string(),
                ));
            }
        }
        CheckpointBackendKind::Redis => {
            let redis_url = config.redis_url.as_deref().unwrap_or_default();
            if redis_url.is_empty() {
                return Err(ConfigError::Validation(
                    "checkpoint.redis-url is required for the redis backend".to_string(),
                ));
            }
            let url = Url::parse(redis_url)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid redis-url: {}", e)))?;
            if url.scheme() != "redis" && url.scheme() != "rediss" {
                return Err(ConfigError::InvalidUrl(format!(
                    "redis-url must use redis:// or rediss://, got '{}'",
                    redis_url
                )));
            }
        }
    }

    Ok(())
}

fn validate_followers_flow(config: &FollowersFlowConfig) -> Result<(), ConfigError> {
    validate_identifier(&config.table)?;
    validate_checkpoint_key("followers", &config.checkpoint_key)?;
    Ok(())
}

fn validate_seeded_flow(name: &str, config: &SeededFlowConfig) -> Result<(), ConfigError> {
    validate_identifier(&config.table)?;
    validate_identifier(&config.seed_table)?;
    validate_checkpoint_key(name, &config.checkpoint_key)?;

    if let Some(order_by) = &config.seed_order_by {
        validate_order_by(order_by)?;
    }

    Ok(())
}

fn validate_checkpoint_key(flow: &str, key: &str) -> Result<(), ConfigError> {
    if key.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "{}.checkpoint-key cannot be empty",
            flow
        )));
    }
    Ok(())
}

/// Validates an absolute http(s) URL
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    Ok(())
}

/// Validates a table or database name that is interpolated into SQL
fn validate_identifier(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::InvalidIdentifier(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(ConfigError::InvalidIdentifier(format!(
            "Identifier '{}' cannot start with a digit",
            name
        )));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::InvalidIdentifier(format!(
            "Identifier '{}' may only contain ASCII letters, digits and '_'",
            name
        )));
    }

    Ok(())
}

/// Validates an ORDER BY clause: comma separated columns with optional direction
fn validate_order_by(clause: &str) -> Result<(), ConfigError> {
    for term in clause.split(',') {
        let mut parts = term.split_whitespace();
        let column = parts.next().ok_or_else(|| {
            ConfigError::Validation(format!("Empty term in seed-order-by '{}'", clause))
        })?;
        validate_identifier(column)?;

        if let Some(direction) = parts.next() {
            if !direction.eq_ignore_ascii_case("asc") && !direction.eq_ignore_ascii_case("desc") {
                return Err(ConfigError::Validation(format!(
                    "Invalid sort direction '{}' in seed-order-by",
                    direction
                )));
            }
        }

        if parts.next().is_some() {
            return Err(ConfigError::Validation(format!(
                "Unexpected tokens in seed-order-by term '{}'",
                term.trim()
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("tracks_v2").is_ok());

        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1users").is_err());
        assert!(validate_identifier("users; DROP TABLE x").is_err());
        assert!(validate_identifier("db.users").is_err());
    }

    #[test]
    fn test_validate_order_by() {
        assert!(validate_order_by("created_at DESC").is_ok());
        assert!(validate_order_by("id, created_at desc").is_ok());

        assert!(validate_order_by("").is_err());
        assert!(validate_order_by("created_at sideways").is_err());
        assert!(validate_order_by("id DESC LIMIT 1").is_err());
    }

    #[test]
    fn test_validate_retry_config() {
        let ok = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 1000,
        };
        assert!(validate_retry_config(&ok).is_ok());

        let inverted = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 5000,
            max_delay_ms: 1000,
        };
        assert!(validate_retry_config(&inverted).is_err());

        let no_attempts = RetryConfig {
            max_attempts: 0,
            ..ok
        };
        assert!(validate_retry_config(&no_attempts).is_err());
    }

    #[test]
    fn test_redis_backend_requires_url() {
        let config = CheckpointConfig {
            backend: CheckpointBackendKind::Redis,
            path: String::new(),
            redis_url: None,
        };
        assert!(validate_checkpoint_config(&config).is_err());

        let config = CheckpointConfig {
            backend: CheckpointBackendKind::Redis,
            path: String::new(),
            redis_url: Some("http://localhost:6379".to_string()),
        };
        assert!(validate_checkpoint_config(&config).is_err());

        let config = CheckpointConfig {
            backend: CheckpointBackendKind::Redis,
            path: String::new(),
            redis_url: Some("redis://localhost:6379/0".to_string()),
        };
        assert!(validate_checkpoint_config(&config).is_ok());
    }
}
