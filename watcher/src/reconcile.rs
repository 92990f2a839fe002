//! Ignore-spec reconciliation.
//!
//! The live watcher never reports events for excluded paths. When the
//! pattern file itself changes, paths can fall out of the observed set with
//! no filesystem event ever firing for them, so the downstream index must be
//! told explicitly to purge them. Each pass reloads the spec, re-walks the
//! tree, diffs the excluded set against the previous snapshot and
//! synthesizes `deleted` events for the newly excluded paths.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::WatchConfig;
use crate::event::{ChangeEvent, ChangeKind, NotificationBatch};
use crate::matcher::{ExclusionPolicy, IgnoreSpec};
use crate::notifier::IngestNotifier;
use crate::paths::relative_posix;
use crate::state::WatchState;

/// Outcome of a pass that found a changed pattern file.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Paths excluded now but not before. A `deleted` event was synthesized
    /// for each.
    pub newly_excluded: Vec<String>,

    /// Paths excluded before but not now. No event is synthesized for
    /// these: the index holds nothing for a path that was excluded, so
    /// nothing needs purging, and re-indexing waits for a real filesystem
    /// event.
    pub newly_included: Vec<String>,
}

/// Polls the pattern file and reconciles exclusion state on change.
pub struct IgnoreReconciler {
    root: PathBuf,
    ignore_path: PathBuf,
    project_id: String,
    poll_interval: Duration,
    state: Arc<WatchState>,
    notifier: IngestNotifier,
    last_mtime: Option<SystemTime>,
}

impl IgnoreReconciler {
    /// Create a reconciler. The pattern file's current mtime is taken as the
    /// last observed value, so the first tick only acts on a later change.
    pub fn new(config: &WatchConfig, state: Arc<WatchState>, notifier: IngestNotifier) -> Self {
        let ignore_path = config.ignore_path();
        let last_mtime = ignore_mtime(&ignore_path);
        Self {
            root: config.root.clone(),
            ignore_path,
            project_id: config.project_id.clone(),
            poll_interval: config.poll_interval,
            state,
            notifier,
            last_mtime,
        }
    }

    /// Timer loop. Passes are strictly serialized: a tick that fires while a
    /// pass is still running is skipped rather than queued.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await; // the first tick completes immediately

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Some(outcome) = self.poll_once().await {
                        info!(
                            "reconciled ignore spec: {} newly excluded, {} newly included",
                            outcome.newly_excluded.len(),
                            outcome.newly_included.len(),
                        );
                    }
                }
            }
        }
        debug!("reconciler for {} exited", self.root.display());
    }

    /// One check/reload/diff/notify pass. Returns `None` when the pattern
    /// file is unchanged since the last observation.
    pub async fn poll_once(&mut self) -> Option<ReconcileOutcome> {
        let mtime = ignore_mtime(&self.ignore_path);
        if mtime == self.last_mtime {
            return None;
        }
        self.last_mtime = mtime;
        info!("ignore file changed: {}", self.ignore_path.display());

        let spec = IgnoreSpec::load(&self.root, &self.ignore_path);
        let excluded = excluded_files(&self.root, &spec);

        // Swap the spec in before notifying so live classification already
        // follows the new rules while the corrective batch goes out.
        self.state.replace_spec(spec).await;
        let previous = self.state.replace_excluded(excluded.clone()).await;

        let newly_excluded: Vec<String> = excluded.difference(&previous).cloned().collect();
        let newly_included: Vec<String> = previous.difference(&excluded).cloned().collect();

        if !newly_included.is_empty() {
            // Re-included paths get no synthesized event; the index holds
            // nothing for them until a real filesystem event arrives.
            debug!("{} path(s) re-included, index left untouched", newly_included.len());
        }

        if !newly_excluded.is_empty() {
            let mut batch = NotificationBatch::new(&self.project_id);
            for path in &newly_excluded {
                batch.push(ChangeEvent::new(ChangeKind::Deleted, path.clone()));
            }
            info!("synthesizing {} delete(s) for newly excluded paths", batch.len());
            self.notifier.send(&batch).await;
        }

        Some(ReconcileOutcome {
            newly_excluded,
            newly_included,
        })
    }
}

/// Full tree walk collecting the root-relative files the spec excludes.
/// Unreadable entries are skipped and the walk keeps going.
pub(crate) fn excluded_files(root: &Path, spec: &IgnoreSpec) -> BTreeSet<String> {
    let mut excluded = BTreeSet::new();

    let entries = WalkDir::new(root).into_iter().filter_map(|entry| match entry {
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
        let Some(rel) = relative_posix(entry.path(), root) else {
            continue;
        };
        if spec.is_excluded(&rel, false) {
            excluded.insert(rel);
        }
    }

    excluded
}

fn ignore_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
