//! Configuration for the watch service.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default ignore-pattern file name, resolved against the watch root.
pub const DEFAULT_IGNORE_FILE: &str = ".ragignore";

/// Default interval between ignore-file polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Configuration for a watch service instance.
///
/// Every collaborator address and identifier is carried here and passed in
/// at construction; no component reads process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directory tree under observation.
    pub root: PathBuf,

    /// Ignore-pattern file, absolute or relative to the root.
    pub ignore_file: PathBuf,

    /// Ingestion endpoint URL receiving notification batches.
    pub endpoint: String,

    /// Project identifier stamped on every batch.
    pub project_id: String,

    /// How often the ignore file is polled for changes.
    pub poll_interval: Duration,
}

impl WatchConfig {
    /// Create a configuration with default ignore file and poll interval.
    pub fn new(
        root: impl Into<PathBuf>,
        endpoint: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            ignore_file: PathBuf::from(DEFAULT_IGNORE_FILE),
            endpoint: endpoint.into(),
            project_id: project_id.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the ignore-pattern file location.
    pub fn with_ignore_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ignore_file = path.into();
        self
    }

    /// Override the ignore-file poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Absolute path of the ignore-pattern file.
    pub fn ignore_path(&self) -> PathBuf {
        if self.ignore_file.is_absolute() {
            self.ignore_file.clone()
        } else {
            self.root.join(&self.ignore_file)
        }
    }
}
