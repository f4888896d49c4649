//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: CLI arguments → OData requests →
//! JSON-lines messages and state file

use chrono::{Duration, Utc};
use clap::Parser;
use r365_tap::catalog::Catalog;
use r365_tap::cli::{Cli, Runner};
use r365_tap::engine::{PageFetcher, StreamStatus, SyncConfig, SyncEngine};
use r365_tap::http::{HttpClient, HttpClientConfig, RetryPolicy};
use r365_tap::output::{JsonLinesSink, MemorySink};
use r365_tap::state::{BookmarkStore, StateManager};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// `acme\jane:pw`
const BASIC_AUTH: &str = "Basic YWNtZVxqYW5lOnB3";

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn messages(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn config_json(server: &MockServer, start_date: &str) -> String {
    json!({
        "username": "jane",
        "password": "pw",
        "store_name": "acme",
        "start_date": start_date,
        "base_url": server.uri(),
        "http": {"requests_per_second": 0},
        "retry": {"max_attempts": 2, "backoff_factor_ms": 1, "max_backoff_ms": 1}
    })
    .to_string()
}

async fn run(args: &[&str]) -> (r365_tap::Result<()>, Vec<Value>) {
    let buffer = SharedBuffer::default();
    let mut argv = vec!["r365-tap"];
    argv.extend_from_slice(args);
    let cli = Cli::parse_from(argv);
    let runner = Runner::with_output(cli, JsonLinesSink::new(buffer.clone()));
    let result = runner.run().await;
    (result, buffer.messages())
}

fn records_for<'a>(messages: &'a [Value], stream: &str) -> Vec<&'a Value> {
    messages
        .iter()
        .filter(|m| m["type"] == "RECORD" && m["record"]["stream"] == stream)
        .map(|m| &m["record"]["data"])
        .collect()
}

fn last_of_type<'a>(messages: &'a [Value], kind: &str) -> &'a Value {
    messages.iter().rev().find(|m| m["type"] == kind).unwrap()
}

// ============================================================================
// CLI Read Tests
// ============================================================================

#[tokio::test]
async fn test_read_entity_and_transaction_streams() {
    let server = MockServer::start().await;
    let start = Utc::now() - Duration::days(3);
    let start_date = start.format("%Y-%m-%d").to_string();
    let modified = (start + Duration::days(1))
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string();

    Mock::given(method("GET"))
        .and(path("/Item"))
        .and(header("Authorization", BASIC_AUTH))
        .and(query_param("$orderby", "modifiedOn"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"itemId": "I1", "name": "Flour", "modifiedOn": "2024-03-01T10:00:00", "secret": 1},
                {"itemId": "I2", "name": "Salt", "modifiedOn": "2024-03-02T10:00:00"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/Transaction"))
        .and(header("Authorization", BASIC_AUTH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"transactionId": "T1", "modifiedOn": modified},
                {"transactionId": "T2", "modifiedOn": modified}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/TransactionDetail"))
        .and(query_param(
            "$filter",
            "transactionId eq T1 or transactionId eq T2",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"transactionDetailId": "D1", "transactionId": "T1", "amount": 4.5}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let config = config_json(&server, &start_date);

    let (result, messages) = run(&[
        "--config-json",
        &config,
        "--state",
        state_path.to_str().unwrap(),
        "read",
        "--streams",
        "items,transaction",
    ])
    .await;
    result.unwrap();

    let items = records_for(&messages, "items");
    assert_eq!(items.len(), 2);
    // Fields outside the catalog schema are dropped
    assert!(items[0].get("secret").is_none());
    assert_eq!(items[0]["name"], "Flour");

    assert_eq!(records_for(&messages, "transaction").len(), 2);
    assert_eq!(records_for(&messages, "transaction_detail").len(), 1);

    let summary = &last_of_type(&messages, "SYNC_SUMMARY")["summary"];
    assert_eq!(summary["status"], "SUCCEEDED");
    assert_eq!(summary["total_streams"], 2);
    assert_eq!(summary["failed_streams"], 0);

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
    assert_eq!(
        saved["bookmarks"]["items"]["replication_key_value"],
        "2024-03-02T10:00:00Z"
    );
    assert!(saved["bookmarks"]["transaction"]["replication_key_value"].is_string());
    assert!(saved["bookmarks"]["transaction"]
        .get("progress_markers")
        .is_none());

    let final_state = &last_of_type(&messages, "STATE")["state"];
    assert_eq!(final_state, &saved);
}

#[tokio::test]
async fn test_read_resumes_from_inline_state() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Location"))
        .and(query_param("$filter", "modifiedOn ge 2024-05-01T08:00:01Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"locationId": "L9", "modifiedOn": "2024-05-03T00:00:00"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_json(&server, "2020-01-01");
    let state = json!({
        "bookmarks": {
            "locations": {
                "replication_key": "modifiedOn",
                "replication_key_value": "2024-05-01T08:00:00"
            }
        }
    })
    .to_string();

    let (result, messages) = run(&[
        "--config-json",
        &config,
        "--state-json",
        &state,
        "read",
        "--streams",
        "locations",
    ])
    .await;
    result.unwrap();

    assert_eq!(records_for(&messages, "locations").len(), 1);
    let final_state = &last_of_type(&messages, "STATE")["state"];
    assert_eq!(
        final_state["bookmarks"]["locations"]["replication_key_value"],
        "2024-05-03T00:00:00Z"
    );
}

#[tokio::test]
async fn test_fatal_status_fails_only_that_stream() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/GLAccount"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Company"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"companyId": "C1", "modifiedOn": "2024-01-01T00:00:00"}]
        })))
        .mount(&server)
        .await;

    let config = config_json(&server, "2024-01-01");
    let (result, messages) = run(&[
        "--config-json",
        &config,
        "read",
        "--streams",
        "accounts,vendors",
    ])
    .await;
    result.unwrap();

    let summary = &last_of_type(&messages, "SYNC_SUMMARY")["summary"];
    assert_eq!(summary["status"], "PARTIAL");
    assert_eq!(summary["failed_streams"], 1);
    assert_eq!(summary["streams"][0]["status"], "FAILED");
    assert!(summary["streams"][0]["error"]
        .as_str()
        .unwrap()
        .contains("401"));

    assert!(messages
        .iter()
        .any(|m| m["type"] == "LOG" && m["log"]["level"] == "ERROR"));
    assert_eq!(records_for(&messages, "vendors").len(), 1);
}

#[tokio::test]
async fn test_read_without_config_is_error() {
    let (result, messages) = run(&["read"]).await;
    assert!(result.is_err());
    assert!(messages.is_empty());
}

#[tokio::test]
async fn test_unknown_stream_selection_is_error() {
    let server = MockServer::start().await;
    let config = config_json(&server, "2024-01-01");
    let (result, _) = run(&["--config-json", &config, "read", "--streams", "nope"]).await;
    assert!(result.is_err());
}

// ============================================================================
// Discovery Tests
// ============================================================================

#[tokio::test]
async fn test_discover_builtin_catalog() {
    let (result, messages) = run(&["discover"]).await;
    result.unwrap();

    let streams = messages[0]["catalog"]["streams"].as_array().unwrap();
    assert_eq!(streams.len(), 20);

    let detail = streams
        .iter()
        .find(|s| s["name"] == "transaction_detail")
        .unwrap();
    assert_eq!(detail["parent_stream"], "transaction");
    assert_eq!(
        detail["source_defined_primary_key"],
        json!([["transactionDetailId"]])
    );
}

#[tokio::test]
async fn test_streams_lists_names() {
    let (result, messages) = run(&["streams"]).await;
    result.unwrap();

    assert_eq!(messages[0]["type"], "STREAMS");
    let names = messages[0]["streams"].as_array().unwrap();
    assert!(names.contains(&json!("payroll_summary")));
}

// ============================================================================
// Library Tests
// ============================================================================

#[tokio::test]
async fn test_engine_with_file_state_survives_restart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Item"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"itemId": "I1", "modifiedOn": "2024-02-02T00:00:00"}]
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let catalog = Arc::new(Catalog::builtin().unwrap());

    let client = HttpClient::with_config(
        HttpClientConfig::builder()
            .base_url(server.uri())
            .no_rate_limit()
            .build(),
    )
    .unwrap();
    let fetcher = Arc::new(PageFetcher::new(Arc::new(client), RetryPolicy::new()));
    let sink = Arc::new(MemorySink::new());

    let mut engine = SyncEngine::new(
        fetcher,
        Arc::new(StateManager::new(&state_path)),
        sink.clone(),
        catalog,
    )
    .with_config(SyncConfig::new().with_start_date(Utc::now() - Duration::days(30)));

    let report = engine.sync_all(&["items".to_string()]).await;
    assert!(report.is_success());
    assert_eq!(
        report.stream("items").unwrap().status,
        StreamStatus::Completed
    );
    assert_eq!(sink.record_count().await, 1);

    let reloaded = StateManager::from_file(&state_path).unwrap();
    let bookmark = reloaded.load("items").await.unwrap();
    assert_eq!(
        bookmark.replication_key_value.unwrap().to_rfc3339(),
        "2024-02-02T00:00:00+00:00"
    );
}
