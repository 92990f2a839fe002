//! End-to-end tests for the watch service: live filtering, reconciliation
//! delete synthesis, the documented re-inclusion gap and shutdown behavior.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use ragwatch_watcher::{WatchConfig, WatchService};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const POLL: Duration = Duration::from_millis(100);

/// Long enough for the subscription to settle or for several poll ticks.
const SETTLE: Duration = Duration::from_millis(400);
const PROPAGATE: Duration = Duration::from_millis(900);

fn write_file(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

async fn mock_endpoint() -> (MockServer, String) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest/notify"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let endpoint = format!("{}/ingest/notify", server.uri());
    (server, endpoint)
}

async fn start_service(root: &Path, endpoint: &str) -> WatchService {
    let config = WatchConfig::new(root, endpoint, "test-project").with_poll_interval(POLL);
    let mut service = WatchService::new(config);
    service.start().await.unwrap();
    tokio::time::sleep(SETTLE).await;
    service
}

/// Flatten every event the mock endpoint has received so far.
async fn received_events(server: &MockServer) -> Vec<serde_json::Value> {
    let mut events = Vec::new();
    for request in server.received_requests().await.unwrap_or_default() {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        if let Some(batch) = body["events"].as_array() {
            events.extend(batch.iter().cloned());
        }
    }
    events
}

fn paths_of_kind<'a>(events: &'a [serde_json::Value], kind: &str) -> Vec<&'a str> {
    events
        .iter()
        .filter(|event| event["event_type"] == kind)
        .filter_map(|event| event["path"].as_str())
        .collect()
}

#[tokio::test]
async fn test_creation_events_respect_ignore_patterns() {
    let dir = TempDir::new().unwrap();
    write_file(&dir.path().join(".ragignore"), "*.skip\n");
    fs::create_dir(dir.path().join("sub")).unwrap();

    let (server, endpoint) = mock_endpoint().await;
    let mut service = start_service(dir.path(), &endpoint).await;

    write_file(&dir.path().join("a.txt"), "a");
    write_file(&dir.path().join("b.skip"), "b");
    write_file(&dir.path().join("sub/c.txt"), "c");

    tokio::time::sleep(PROPAGATE).await;
    service.stop().await;

    let events = received_events(&server).await;
    let created: HashSet<&str> = paths_of_kind(&events, "created").into_iter().collect();
    assert!(created.contains("a.txt"), "missing a.txt in {events:?}");
    assert!(created.contains("sub/c.txt"), "missing sub/c.txt in {events:?}");
    assert!(
        events.iter().all(|event| event["path"] != "b.skip"),
        "excluded path leaked: {events:?}"
    );
}

#[tokio::test]
async fn test_pattern_change_synthesizes_delete_for_newly_excluded() {
    let dir = TempDir::new().unwrap();
    write_file(&dir.path().join(".ragignore"), "*.skip\n");
    write_file(&dir.path().join("a.txt"), "a");
    write_file(&dir.path().join("b.skip"), "b");

    let (server, endpoint) = mock_endpoint().await;
    let mut service = start_service(dir.path(), &endpoint).await;

    write_file(&dir.path().join(".ragignore"), "*.skip\na.txt\n");

    tokio::time::sleep(PROPAGATE).await;
    service.stop().await;

    let events = received_events(&server).await;
    let deleted = paths_of_kind(&events, "deleted");
    assert_eq!(deleted, vec!["a.txt"], "expected one delete in {events:?}");
}

#[tokio::test]
async fn test_pattern_removal_synthesizes_nothing_for_reincluded_paths() {
    let dir = TempDir::new().unwrap();
    write_file(&dir.path().join(".ragignore"), "*.skip\n");
    write_file(&dir.path().join("a.txt"), "a");
    write_file(&dir.path().join("b.skip"), "b");

    let (server, endpoint) = mock_endpoint().await;
    let mut service = start_service(dir.path(), &endpoint).await;

    // Drop the pattern that excluded b.skip. The path is back in the
    // observed set, but nothing is synthesized for it; the index only
    // learns about it on the next real filesystem event.
    write_file(&dir.path().join(".ragignore"), "# nothing\n");

    tokio::time::sleep(PROPAGATE).await;
    service.stop().await;

    let events = received_events(&server).await;
    assert!(
        events.iter().all(|event| event["path"] != "b.skip"),
        "unexpected event for re-included path: {events:?}"
    );
    assert!(
        paths_of_kind(&events, "deleted").is_empty(),
        "unexpected synthesized delete: {events:?}"
    );
}

#[tokio::test]
async fn test_live_events_follow_the_reloaded_spec() {
    let dir = TempDir::new().unwrap();
    write_file(&dir.path().join(".ragignore"), "*.skip\n");

    let (server, endpoint) = mock_endpoint().await;
    let mut service = start_service(dir.path(), &endpoint).await;

    // Start excluding *.txt as well; the spec swap must be picked up by
    // the live loop once the next poll tick runs.
    write_file(&dir.path().join(".ragignore"), "*.skip\n*.txt\n");
    tokio::time::sleep(PROPAGATE).await;

    write_file(&dir.path().join("late.txt"), "late");
    tokio::time::sleep(PROPAGATE).await;
    service.stop().await;

    let events = received_events(&server).await;
    assert!(
        events.iter().all(|event| event["path"] != "late.txt"),
        "event leaked past reloaded spec: {events:?}"
    );
}

#[tokio::test]
async fn test_rename_reports_single_moved_event() {
    let dir = TempDir::new().unwrap();
    write_file(&dir.path().join("a.txt"), "a");

    let (server, endpoint) = mock_endpoint().await;
    let mut service = start_service(dir.path(), &endpoint).await;

    fs::rename(dir.path().join("a.txt"), dir.path().join("renamed.txt")).unwrap();

    tokio::time::sleep(PROPAGATE).await;
    service.stop().await;

    let events = received_events(&server).await;
    let moved: Vec<_> = events
        .iter()
        .filter(|event| event["event_type"] == "moved")
        .collect();
    assert_eq!(moved.len(), 1, "expected one moved event in {events:?}");
    assert_eq!(moved[0]["path"], "renamed.txt");
    assert_eq!(moved[0]["old_path"], "a.txt");
    assert!(
        paths_of_kind(&events, "deleted").is_empty()
            && paths_of_kind(&events, "created").is_empty(),
        "rename leaked extra events: {events:?}"
    );
}

#[tokio::test]
async fn test_stop_releases_subscription_for_immediate_restart() {
    let dir = TempDir::new().unwrap();
    let (server, endpoint) = mock_endpoint().await;

    let mut service = start_service(dir.path(), &endpoint).await;
    service.stop().await;

    // Same root, immediately afterwards; the old subscription must be gone.
    let mut service = start_service(dir.path(), &endpoint).await;
    write_file(&dir.path().join("after-restart.txt"), "x");
    tokio::time::sleep(PROPAGATE).await;
    service.stop().await;

    let events = received_events(&server).await;
    let created = paths_of_kind(&events, "created");
    assert!(
        created.contains(&"after-restart.txt"),
        "restarted watcher saw nothing: {events:?}"
    );
}
