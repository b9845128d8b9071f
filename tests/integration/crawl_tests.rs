//! Integration tests for the crawl flows
//!
//! These tests use wiremock to stand in for the paginated API and run whole
//! flows end-to-end against an in-memory sink and checkpoint store.

use std::sync::Arc;

use harvester::crawler::{Flow, RunEnd, RunMode};
use harvester::output::MemorySink;
use harvester::storage::{CursorCheckpoint, CursorPosition, OffsetCheckpoint, OffsetLimit};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::common::{harvester, memory_backend, page, test_config};

const TRACKS_KEY: &str = "harvester:tracks:offset";
const FOLLOWERS_KEY: &str = "harvester:followers:last_url";

#[tokio::test]
async fn test_seeded_flow_writes_every_target_and_resumes() {
    let server = MockServer::start().await;
    let base = server.uri();

    // User 7: a single page of three tracks
    Mock::given(method("GET"))
        .and(path("/users/7/tracks"))
        .and(query_param("client_id", "cid"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[70, 71, 72], None)))
        .expect(1)
        .mount(&server)
        .await;

    // User 9: two pages chained by a cursor
    Mock::given(method("GET"))
        .and(path("/users/9/tracks"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            &[90, 91],
            Some(format!("{}/users/9/tracks?offset=2&cursor=c2", base)),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/9/tracks"))
        .and(query_param("cursor", "c2"))
        .and(query_param("client_id", "cid"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[92], None)))
        .expect(1)
        .mount(&server)
        .await;

    let checkpoints = memory_backend();
    let sink = Arc::new(MemorySink::new());
    let config = test_config(&base, "batch-size = 2", "");

    let first = harvester(
        config.clone(),
        Flow::Tracks,
        Arc::clone(&sink),
        Some(vec![7, 9]),
        Arc::clone(&checkpoints),
    );
    let summary = first.run(RunMode::Resume).await.unwrap();

    assert_eq!(summary.end, RunEnd::Exhausted);
    assert_eq!(summary.stats.pages, 3);
    assert_eq!(summary.stats.rows_written, 6);
    assert_eq!(summary.stats.targets_done, 2);
    assert_eq!(summary.stats.batches, 1);

    let mut ids: Vec<u64> = sink
        .rows("tracks")
        .iter()
        .filter_map(|row| row.get("id").and_then(|id| id.as_u64()))
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![70, 71, 72, 90, 91, 92]);

    let checkpoint = OffsetCheckpoint::new(Arc::clone(&checkpoints), TRACKS_KEY);
    assert_eq!(
        checkpoint.load().await.unwrap(),
        Some(OffsetLimit::new(2, 2))
    );

    // A second run starts past both seeds and fetches nothing
    let second = harvester(
        config,
        Flow::Tracks,
        Arc::clone(&sink),
        Some(vec![7, 9]),
        Arc::clone(&checkpoints),
    );
    let summary = second.run(RunMode::Resume).await.unwrap();

    assert_eq!(summary.end, RunEnd::Exhausted);
    assert_eq!(summary.stats.pages, 0);
    assert_eq!(sink.rows("tracks").len(), 6);
}

#[tokio::test]
async fn test_failed_target_does_not_hold_back_batch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/2/tracks"))
        .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/1/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[10], None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/3/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[30, 31], None)))
        .mount(&server)
        .await;

    let checkpoints = memory_backend();
    let sink = Arc::new(MemorySink::new());
    let harvester = harvester(
        test_config(&server.uri(), "batch-size = 3", ""),
        Flow::Tracks,
        Arc::clone(&sink),
        Some(vec![1, 2, 3]),
        Arc::clone(&checkpoints),
    );

    let summary = harvester.run(RunMode::Resume).await.unwrap();

    assert_eq!(summary.end, RunEnd::Exhausted);
    assert_eq!(summary.stats.targets_done, 2);
    assert_eq!(summary.stats.targets_failed, 1);
    assert_eq!(sink.rows("tracks").len(), 3);
    assert_eq!(
        OffsetCheckpoint::new(checkpoints, TRACKS_KEY)
            .load()
            .await
            .unwrap(),
        Some(OffsetLimit::new(3, 3))
    );
}

#[tokio::test]
async fn test_snowball_stops_past_max_offset() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("linked_partitioning", "1"))
        .and(query_param("app_locale", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[100], None)))
        .expect(4)
        .mount(&server)
        .await;

    let checkpoints = memory_backend();
    let sink = Arc::new(MemorySink::new());
    // The batch starting exactly at max-offset still runs
    let harvester = harvester(
        test_config(&server.uri(), "batch-size = 2\nmax-offset = 2", ""),
        Flow::Snowball,
        Arc::clone(&sink),
        Some(vec![1, 2, 3, 4, 5, 6]),
        Arc::clone(&checkpoints),
    );

    let summary = harvester.run(RunMode::Resume).await.unwrap();

    assert_eq!(summary.end, RunEnd::OffsetLimit);
    assert_eq!(summary.stats.targets_done, 4);
    assert_eq!(summary.stats.batches, 2);
    assert_eq!(sink.rows("users").len(), 4);
    assert_eq!(
        OffsetCheckpoint::new(checkpoints, "harvester:snowball:offset_limit")
            .load()
            .await
            .unwrap(),
        Some(OffsetLimit::new(4, 2))
    );
}

#[tokio::test]
async fn test_followers_resume_from_saved_cursor() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/users/5/followers"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[1], None)))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/5/followers"))
        .and(query_param("cursor", "xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[8, 9], None)))
        .expect(1)
        .mount(&server)
        .await;

    let checkpoints = memory_backend();
    let cursor = CursorCheckpoint::new(Arc::clone(&checkpoints), FOLLOWERS_KEY);
    cursor
        .save(Some(&format!(
            "{}/users/5/followers?client_id=cid&limit=2&cursor=xyz",
            base
        )))
        .await;

    let sink = Arc::new(MemorySink::new());
    let harvester = harvester(
        test_config(&base, "", "[followers]\nuser-id = 5"),
        Flow::Followers,
        Arc::clone(&sink),
        None,
        Arc::clone(&checkpoints),
    );

    let summary = harvester.run(RunMode::Resume).await.unwrap();

    assert_eq!(summary.end, RunEnd::Exhausted);
    assert_eq!(sink.rows("followers").len(), 2);
    assert_eq!(cursor.load().await.unwrap(), CursorPosition::Exhausted);
}

#[tokio::test]
async fn test_followers_failure_keeps_cursor_for_next_run() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/users/5/followers"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            &[1, 2],
            Some(format!("{}/users/5/followers?cursor=p2", base)),
        )))
        .expect(1)
        .mount(&server)
        .await;
    // Three attempts, then the stream is abandoned
    Mock::given(method("GET"))
        .and(query_param("cursor", "p2"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let checkpoints = memory_backend();
    let sink = Arc::new(MemorySink::new());
    let config = test_config(&base, "", "[followers]\nuser-id = 5");

    let first = harvester(
        config.clone(),
        Flow::Followers,
        Arc::clone(&sink),
        None,
        Arc::clone(&checkpoints),
    );
    let summary = first.run(RunMode::Resume).await.unwrap();

    assert_eq!(summary.end, RunEnd::Failed);
    assert_eq!(sink.rows("followers").len(), 2);

    let cursor = CursorCheckpoint::new(Arc::clone(&checkpoints), FOLLOWERS_KEY);
    match cursor.load().await.unwrap() {
        CursorPosition::At(url) => assert!(url.contains("cursor=p2")),
        other => panic!("unexpected checkpoint: {}", other),
    }

    // The API recovers; the next run picks up at the failed page only
    server.verify().await;
    server.reset().await;
    Mock::given(method("GET"))
        .and(query_param("cursor", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[3], None)))
        .expect(1)
        .mount(&server)
        .await;

    let second = harvester(
        config,
        Flow::Followers,
        Arc::clone(&sink),
        None,
        Arc::clone(&checkpoints),
    );
    let summary = second.run(RunMode::Resume).await.unwrap();

    assert_eq!(summary.end, RunEnd::Exhausted);
    assert_eq!(sink.rows("followers").len(), 3);
    assert_eq!(cursor.load().await.unwrap(), CursorPosition::Exhausted);
}

#[tokio::test]
async fn test_fresh_run_ignores_exhausted_marker() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/5/followers"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[4], None)))
        .expect(1)
        .mount(&server)
        .await;

    let checkpoints = memory_backend();
    CursorCheckpoint::new(Arc::clone(&checkpoints), FOLLOWERS_KEY)
        .save(None)
        .await;

    let sink = Arc::new(MemorySink::new());
    let harvester = harvester(
        test_config(&server.uri(), "", "[followers]\nuser-id = 5"),
        Flow::Followers,
        Arc::clone(&sink),
        None,
        checkpoints,
    );

    let summary = harvester.run(RunMode::Fresh).await.unwrap();

    assert_eq!(summary.end, RunEnd::Exhausted);
    assert_eq!(sink.rows("followers").len(), 1);
}

#[tokio::test]
async fn test_failed_inserts_are_dropped_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/5/followers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[1, 2], None)))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(MemorySink::new());
    sink.set_failing(true);
    let harvester = harvester(
        test_config(&server.uri(), "", "[followers]\nuser-id = 5"),
        Flow::Followers,
        Arc::clone(&sink),
        None,
        memory_backend(),
    );

    let summary = harvester.run(RunMode::Resume).await.unwrap();

    assert_eq!(summary.end, RunEnd::Exhausted);
    assert_eq!(summary.stats.rows_written, 0);
    assert_eq!(summary.stats.rows_dropped, 2);
    assert_eq!(sink.total_rows(), 0);
}
