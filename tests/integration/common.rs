//! Shared fixtures for the integration tests.

use std::sync::Arc;

use harvester::config::{parse_config, Config};
use harvester::crawler::Flow;
use harvester::output::MemorySink;
use harvester::seed::{SeedSource, VecSeedSource};
use harvester::storage::{CheckpointBackend, SqliteCheckpointBackend};
use harvester::Harvester;
use serde_json::{json, Value};

/// Configuration pointing the API at `base_url`
///
/// Retries are fast (1ms..5ms, 3 attempts) and there is no politeness delay.
/// `crawler` holds extra lines for the `[crawler]` table and `tail` any
/// further tables.
pub fn test_config(base_url: &str, crawler: &str, tail: &str) -> Config {
    let toml = format!(
        r#"
[api]
base-url = "{base_url}"
client-id = "cid"
page-size = 2

[crawler]
politeness-jitter-ms = 0
concurrency = 2
{crawler}

[retry]
max-attempts = 3
base-delay-ms = 1
max-delay-ms = 5

{tail}
"#
    );
    parse_config(&toml).expect("test config should parse")
}

pub fn memory_backend() -> Arc<dyn CheckpointBackend> {
    Arc::new(SqliteCheckpointBackend::in_memory().expect("in-memory sqlite"))
}

/// A harvester writing into `sink` with seeds from a fixed list
pub fn harvester(
    config: Config,
    flow: Flow,
    sink: Arc<MemorySink>,
    seeds: Option<Vec<u64>>,
    checkpoints: Arc<dyn CheckpointBackend>,
) -> Harvester {
    let seeds = seeds.map(|ids| Arc::new(VecSeedSource::new(ids)) as Arc<dyn SeedSource>);
    Harvester::with_parts(config, flow, sink, seeds, checkpoints).expect("harvester parts")
}

/// A page body with records `{"id": n}` for every id
pub fn page(ids: &[u64], next_href: Option<String>) -> Value {
    let collection: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();
    json!({
        "collection": collection,
        "next_href": next_href,
    })
}
