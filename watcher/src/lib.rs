//! # ragwatch-watcher
//!
//! Filesystem observation for the ragwatch ingestion pipeline. Watches a
//! directory tree, filters events through a `.ragignore` spec, keeps the
//! exclusion state reconciled when the spec itself changes, and reports
//! lifecycle changes to the ingestion endpoint.
//!
//! ## Architecture
//!
//! ```text
//!  native FS events ──► DirectoryWatcher ──► delivery loop ──► IngestNotifier
//!                            │ reads                                 ▲
//!                            ▼                                       │
//!                   WatchState (IgnoreSpec + ExcludedSet)            │
//!                            ▲ replaces                              │
//!                            │                                       │
//!  poll timer ─────────► IgnoreReconciler ──── synthesized deletes ──┘
//! ```
//!
//! The reconciler exists because the live watcher never reports events for
//! excluded paths: when the pattern file changes, the downstream index must
//! be told explicitly which paths fell out of the observed set.

pub mod config;
pub mod error;
pub mod event;
pub mod matcher;
pub mod notifier;
pub mod paths;
pub mod reconcile;
pub mod scan;
pub mod service;
pub mod state;
pub mod watcher;

pub use config::WatchConfig;
pub use error::{Result, WatchError};
pub use event::{ChangeEvent, ChangeKind, NotificationBatch};
pub use matcher::{ExclusionPolicy, IgnoreSpec};
pub use notifier::IngestNotifier;
pub use reconcile::{IgnoreReconciler, ReconcileOutcome};
pub use scan::bulk_ingest;
pub use service::WatchService;
pub use state::WatchState;
pub use watcher::DirectoryWatcher;
