//! End-to-end reconciliation tests: mock Orca API, real snapshot files.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use orca_sync::reconcile::{
    LocalSnapshot, ReconcileConfig, ReconcileOutputs, Reconciler, FOUND_FILE, MISSING_FILE,
};
use orca_sync::{snapshot, AlertRecord, DslFilter, Error, OrcaClient, OrcaTransport};

// ============================================================================
// Test Fixtures
// ============================================================================

fn orca_client(server: &MockServer) -> OrcaClient {
    let transport = OrcaTransport::new(&server.uri(), "key-123", Duration::from_secs(5))
        .expect("transport creation should succeed");
    OrcaClient::new(Arc::new(transport))
}

fn orca_alert(alert_id: &str, status: &str) -> serde_json::Value {
    json!({ "state": { "alert_id": alert_id, "status": status } })
}

/// Write a snapshot CSV with the given alert ids.
fn write_snapshot(path: &std::path::Path, ids: &[&str]) {
    let mut content = String::from("alert_id,status\n");
    for id in ids {
        content.push_str(id);
        content.push_str(",open\n");
    }
    fs::write(path, content).expect("snapshot fixture should write");
}

// ============================================================================
// Reconciliation Run Tests
// ============================================================================

/// Local {A, B, C} against remote [A, D, B, E]: found is exactly [A, B] and
/// missing exactly [D, E], statuses carried, in stream order.
#[tokio::test]
async fn test_reconcile_partitions_remote_stream() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir should create");

    Mock::given(method("POST"))
        .and(path("/query/alerts"))
        .and(body_partial_json(json!({ "next_page_token": "t2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [orca_alert("B", "in_progress"), orca_alert("E", "open")],
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/query/alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [orca_alert("A", "open"), orca_alert("D", "open")],
            "next_page_token": "t2",
            "total_items": 4,
        })))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    let snapshot_path = dir.path().join("hsdb.csv");
    write_snapshot(&snapshot_path, &["A", "B", "C"]);
    let local = LocalSnapshot::load(&snapshot_path).expect("snapshot should load");

    let client = orca_client(&server);
    let mut pager = client.query(DslFilter::custom_rules(), 2);
    let mut outputs = ReconcileOutputs::create_in(dir.path()).expect("outputs should create");

    let reconciler = Reconciler::new(ReconcileConfig { progress_every: 1 });
    let summary = reconciler
        .run(&mut pager, &local, &mut outputs)
        .await
        .expect("reconciliation should succeed");

    assert_eq!(summary.processed, 4);
    assert_eq!(summary.found, 2);
    assert_eq!(summary.missing, 2);
    assert_eq!(summary.pages, 2);
    assert!(summary.completed);

    let found = fs::read_to_string(dir.path().join(FOUND_FILE)).expect("found file should exist");
    let missing =
        fs::read_to_string(dir.path().join(MISSING_FILE)).expect("missing file should exist");
    assert_eq!(found, "alert_id,status\nA,open\nB,in_progress\n");
    assert_eq!(missing, "alert_id,status\nD,open\nE,open\n");
}

/// A page failure mid-run stops with partial outputs and an incomplete
/// summary instead of an error.
#[tokio::test]
async fn test_reconcile_stops_with_partial_outputs_on_fetch_failure() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir should create");

    Mock::given(method("POST"))
        .and(path("/query/alerts"))
        .and(body_partial_json(json!({ "next_page_token": "t2" })))
        .respond_with(ResponseTemplate::new(500).set_body_string("query engine unavailable"))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/query/alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [orca_alert("A", "open"), orca_alert("D", "open")],
            "next_page_token": "t2",
        })))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    let snapshot_path = dir.path().join("hsdb.csv");
    write_snapshot(&snapshot_path, &["A"]);
    let local = LocalSnapshot::load(&snapshot_path).expect("snapshot should load");

    let client = orca_client(&server);
    let mut pager = client.query(DslFilter::custom_rules(), 2);
    let mut outputs = ReconcileOutputs::create_in(dir.path()).expect("outputs should create");

    let reconciler = Reconciler::new(ReconcileConfig::default());
    let summary = reconciler
        .run(&mut pager, &local, &mut outputs)
        .await
        .expect("partial run should not be an error");

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.found, 1);
    assert_eq!(summary.missing, 1);
    assert!(!summary.completed);

    let found = fs::read_to_string(dir.path().join(FOUND_FILE)).expect("found file should exist");
    let missing =
        fs::read_to_string(dir.path().join(MISSING_FILE)).expect("missing file should exist");
    assert_eq!(found, "alert_id,status\nA,open\n");
    assert_eq!(missing, "alert_id,status\nD,open\n");
}

// ============================================================================
// Snapshot Precondition Tests
// ============================================================================

/// A missing snapshot fails fast, before any output file is created.
#[test]
fn test_missing_snapshot_fails_before_any_write() {
    let dir = tempfile::tempdir().expect("tempdir should create");
    let snapshot_path = dir.path().join("hsdb.csv");

    // Loading comes first in the run sequence; outputs are only created
    // after it succeeds.
    let result = LocalSnapshot::load(&snapshot_path);
    match result {
        Err(Error::SnapshotUnavailable(message)) => {
            assert!(message.contains("run a full dump first"));
        }
        other => panic!("expected SnapshotUnavailable, got {other:?}"),
    }

    assert!(!dir.path().join(FOUND_FILE).exists());
    assert!(!dir.path().join(MISSING_FILE).exists());
}

/// A snapshot without an alert_id column is as unusable as a missing one.
#[test]
fn test_snapshot_without_alert_id_column_is_unavailable() {
    let dir = tempfile::tempdir().expect("tempdir should create");
    let snapshot_path = dir.path().join("hsdb.csv");
    fs::write(&snapshot_path, "id,status\nA,open\n").expect("fixture should write");

    let result = LocalSnapshot::load(&snapshot_path);
    match result {
        Err(Error::SnapshotUnavailable(message)) => {
            assert!(message.contains("alert_id"));
        }
        other => panic!("expected SnapshotUnavailable, got {other:?}"),
    }
}

/// A well-formed snapshot loads every id exactly once.
#[test]
fn test_snapshot_loads_id_set() {
    let dir = tempfile::tempdir().expect("tempdir should create");
    let snapshot_path = dir.path().join("hsdb.csv");
    write_snapshot(&snapshot_path, &["A", "B", "B", "C"]);

    let local = LocalSnapshot::load(&snapshot_path).expect("snapshot should load");
    assert_eq!(local.len(), 3);
    assert!(local.contains("A"));
    assert!(local.contains("C"));
    assert!(!local.contains("D"));
}

// ============================================================================
// Snapshot Round-Trip Tests
// ============================================================================

/// Writing a dump and reading it back yields structurally identical
/// records, nested fields included.
#[test]
fn test_json_dump_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir should create");
    let path = dir.path().join("orca_alerts.json");

    let records: Vec<AlertRecord> = serde_json::from_value(json!([
        {
            "alert_id": "orca-1",
            "status": "open",
            "asset": { "name": "vm-1", "cloud": { "provider": "aws", "account": "acct-7" } },
            "labels": ["prod", "pci"],
            "orca_score": 9.1
        },
        {
            "alert_id": "orca-2",
            "status": "in_progress",
            "asset": { "name": "bucket-2" }
        }
    ]))
    .expect("records should deserialize");

    snapshot::write_json_file(&records, &path).expect("dump should write");
    let restored = snapshot::read_json(&path).expect("dump should read back");

    assert_eq!(records, restored);
}
