//! Integration tests for a fully connected harvester
//!
//! ClickHouse is mocked at its HTTP interface and checkpoints go to a SQLite
//! file, so the run and the resumed run share nothing but that file.

use std::sync::Arc;

use harvester::crawler::{Flow, Harvester, RunEnd, RunMode};
use harvester::storage::{OffsetCheckpoint, OffsetLimit, SqliteCheckpointBackend};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::common::{page, test_config};

const SEED_QUERY_FIRST: &str = "SELECT id FROM `sc`.`users` LIMIT 2 OFFSET 0 FORMAT JSONEachRow";
const SEED_QUERY_SECOND: &str = "SELECT id FROM `sc`.`users` LIMIT 2 OFFSET 2 FORMAT JSONEachRow";

fn store_tail(clickhouse: &MockServer, dir: &TempDir) -> String {
    format!(
        r#"
[clickhouse]
url = "{}"
database = "sc"

[checkpoint]
backend = "sqlite"
path = "{}"
"#,
        clickhouse.uri(),
        dir.path().join("checkpoints.db").display()
    )
}

async fn mount_api(api: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users/7/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[70, 71], None)))
        .expect(1)
        .mount(api)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/9/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[90], None)))
        .expect(1)
        .mount(api)
        .await;
}

#[tokio::test]
async fn test_connected_tracks_run_loads_clickhouse() {
    let api = MockServer::start().await;
    let clickhouse = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_api(&api).await;

    // Ids arrive both quoted and bare
    Mock::given(method("GET"))
        .and(query_param("query", SEED_QUERY_FIRST))
        .and(query_param("database", "sc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":\"7\"}\n{\"id\":9}\n"))
        .expect(1)
        .mount(&clickhouse)
        .await;
    Mock::given(method("GET"))
        .and(query_param("query", SEED_QUERY_SECOND))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(1)
        .mount(&clickhouse)
        .await;
    Mock::given(method("POST"))
        .and(query_param("database", "sc"))
        .and(query_param("max_partitions_per_insert_block", "1000"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&clickhouse)
        .await;

    let config = test_config(&api.uri(), "batch-size = 2", &store_tail(&clickhouse, &dir));
    let harvester = Harvester::connect(config, Flow::Tracks).await.unwrap();
    let summary = harvester.run(RunMode::Resume).await.unwrap();
    harvester.close().await;

    assert_eq!(summary.end, RunEnd::Exhausted);
    assert_eq!(summary.stats.rows_written, 3);

    let inserted: usize = clickhouse
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| !request.body.is_empty())
        .map(|request| String::from_utf8_lossy(&request.body).lines().count())
        .sum();
    assert_eq!(inserted, 3);

    let backend = SqliteCheckpointBackend::new(&dir.path().join("checkpoints.db")).unwrap();
    let checkpoint = OffsetCheckpoint::new(Arc::new(backend), "harvester:tracks:offset");
    assert_eq!(
        checkpoint.load().await.unwrap(),
        Some(OffsetLimit::new(2, 2))
    );
}

#[tokio::test]
async fn test_unreachable_seed_query_ends_run() {
    let api = MockServer::start().await;
    let clickhouse = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Code: 60. Table sc.users does not exist"))
        .expect(1)
        .mount(&clickhouse)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[1], None)))
        .expect(0)
        .mount(&api)
        .await;

    let config = test_config(&api.uri(), "batch-size = 2", &store_tail(&clickhouse, &dir));
    let harvester = Harvester::connect(config, Flow::Tracks).await.unwrap();
    let summary = harvester.run(RunMode::Resume).await.unwrap();

    assert_eq!(summary.end, RunEnd::Exhausted);
    assert_eq!(
        harvester.describe_checkpoint().await.unwrap(),
        "harvester:tracks:offset = (none)"
    );
    harvester.close().await;
}

#[tokio::test]
async fn test_connect_without_client_id_fails() {
    let api = MockServer::start().await;
    let clickhouse = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let mut config = test_config(&api.uri(), "", &store_tail(&clickhouse, &dir));
    config.api.client_id = String::new();

    assert!(Harvester::connect(config, Flow::Followers).await.is_err());
}
