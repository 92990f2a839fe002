//! Change events and notification batches.
//!
//! These types are the wire contract with the ingestion endpoint: paths are
//! root-relative with `/` separators, event types serialize as snake_case
//! strings and optional fields are omitted when absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of file lifecycle change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// File or directory was created.
    Created,

    /// File content or metadata changed.
    Modified,

    /// File or directory was deleted, or fell out of the observed set.
    Deleted,

    /// File or directory was renamed within the tree.
    Moved,
}

/// A single file lifecycle change reported to the ingestion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Root-relative POSIX path of the affected file.
    pub path: String,

    /// What happened to it.
    #[serde(rename = "event_type")]
    pub kind: ChangeKind,

    /// When the event was observed (UTC).
    pub timestamp: DateTime<Utc>,

    /// Previous path, present only for [`ChangeKind::Moved`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,

    /// Inline file content. The watch service never populates this; the
    /// ingestion side reads content itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChangeEvent {
    /// Create an event observed now.
    pub fn new(kind: ChangeKind, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            timestamp: Utc::now(),
            old_path: None,
            content: None,
        }
    }

    /// Create a `moved` event carrying both halves of a rename.
    pub fn moved(old_path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Self {
            old_path: Some(old_path.into()),
            ..Self::new(ChangeKind::Moved, new_path)
        }
    }
}

/// A batch of change events, the unit of delivery to the endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationBatch {
    /// Project identifier the events belong to.
    pub project_id: String,

    /// Events in this batch.
    pub events: Vec<ChangeEvent>,
}

impl NotificationBatch {
    /// Create an empty batch for a project.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            events: Vec::new(),
        }
    }

    /// Add an event to the batch.
    pub fn push(&mut self, event: ChangeEvent) {
        self.events.push(event);
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }
}
