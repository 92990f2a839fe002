//! Bulk ingestion of an existing tree.
//!
//! A one-shot walk that reports every non-excluded file as `created`, used
//! to seed the index before live watching takes over.

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::WatchConfig;
use crate::error::Result;
use crate::event::{ChangeEvent, ChangeKind, NotificationBatch};
use crate::matcher::{ExclusionPolicy, IgnoreSpec};
use crate::notifier::IngestNotifier;
use crate::paths::{ensure_dir, relative_posix};

/// Walk the tree once and deliver a `created` event for every file the
/// current ignore spec does not exclude. Returns the number of files
/// reported. Unlike the live loops, a delivery failure here is surfaced to
/// the caller.
pub async fn bulk_ingest(config: &WatchConfig, notifier: &IngestNotifier) -> Result<usize> {
    ensure_dir(&config.root)?;
    let spec = IgnoreSpec::load(&config.root, &config.ignore_path());

    let mut batch = NotificationBatch::new(&config.project_id);
    let entries = WalkDir::new(&config.root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("skipping unreadable entry: {err}");
                None
            }
        });

    for entry in entries {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(rel) = relative_posix(entry.path(), &config.root) else {
            continue;
        };
        if spec.is_excluded(&rel, false) {
            continue;
        }
        batch.push(ChangeEvent::new(ChangeKind::Created, rel));
    }

    let count = batch.len();
    if count == 0 {
        info!("bulk ingest: nothing to report under {}", config.root.display());
        return Ok(0);
    }

    notifier.try_send(&batch).await?;
    info!("bulk ingest: reported {count} file(s)");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_bulk_ingest_reports_non_excluded_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".ragignore"), "*.skip\n").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("b.skip"), "b").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.txt"), "c").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest/notify"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = WatchConfig::new(
            dir.path(),
            format!("{}/ingest/notify", server.uri()),
            "proj1",
        );
        let notifier = IngestNotifier::new(config.endpoint.clone());
        let count = bulk_ingest(&config, &notifier).await.unwrap();
        assert_eq!(count, 3); // a.txt, sub/c.txt and the ignore file itself

        let requests = server.received_requests().await.unwrap_or_default();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let paths: BTreeSet<&str> = body["events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|event| event["path"].as_str().unwrap())
            .collect();
        assert_eq!(paths, BTreeSet::from([".ragignore", "a.txt", "sub/c.txt"]));
    }

    #[tokio::test]
    async fn test_bulk_ingest_fails_on_missing_root() {
        let notifier = IngestNotifier::new("http://127.0.0.1:9/ingest/notify");
        let config = WatchConfig::new(
            "/nonexistent/path/12345",
            "http://127.0.0.1:9/ingest/notify",
            "proj1",
        );
        assert!(bulk_ingest(&config, &notifier).await.is_err());
    }

    #[tokio::test]
    async fn test_bulk_ingest_surfaces_delivery_failure() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        let notifier = IngestNotifier::new("http://127.0.0.1:9/ingest/notify");
        let config = WatchConfig::new(dir.path(), "http://127.0.0.1:9/ingest/notify", "proj1");
        assert!(bulk_ingest(&config, &notifier).await.is_err());
    }
}
