//! Live filesystem watching.
//!
//! Raw notifications are forwarded from the notify callback thread into a
//! channel; an async loop classifies each path against the current ignore
//! spec and emits accepted events. Excluded paths are dropped silently.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::error::{Result, WatchError};
use crate::event::{ChangeEvent, ChangeKind};
use crate::matcher::{ExclusionPolicy, IgnoreSpec};
use crate::paths::{ensure_dir, relative_posix};
use crate::state::WatchState;

/// How long an unpaired rename half is held before it degrades to a plain
/// delete. Pairing is best-effort on platforms that report the two halves as
/// separate notifications.
const RENAME_PAIR_WINDOW: Duration = Duration::from_millis(500);

/// Capacity of the raw and accepted event channels.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Watches a directory tree and emits change events for paths the current
/// ignore spec does not exclude.
pub struct DirectoryWatcher {
    root: PathBuf,
    state: Arc<WatchState>,
    watcher: Option<RecommendedWatcher>,
    loop_task: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl DirectoryWatcher {
    /// Create a watcher for `root` classifying against `state`.
    pub fn new(root: impl Into<PathBuf>, state: Arc<WatchState>, cancel: CancellationToken) -> Self {
        Self {
            root: root.into(),
            state,
            watcher: None,
            loop_task: None,
            cancel,
        }
    }

    /// Begin the recursive subscription and return the receiver of accepted
    /// events. Fails when the root is missing or not a directory.
    pub fn start(&mut self) -> Result<mpsc::Receiver<ChangeEvent>> {
        if self.watcher.is_some() {
            return Err(WatchError::AlreadyRunning);
        }
        ensure_dir(&self.root)?;

        let (raw_tx, raw_rx) = mpsc::channel::<notify::Event>(EVENT_CHANNEL_CAPACITY);
        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if raw_tx.blocking_send(event).is_err() {
                        // Receiver is gone during shutdown.
                        trace!("raw event channel closed");
                    }
                }
                Err(err) => error!("watch error: {err}"),
            },
        )?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        self.watcher = Some(watcher);

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let state = self.state.clone();
        let root = self.root.clone();
        let cancel = self.cancel.clone();
        self.loop_task = Some(tokio::spawn(async move {
            run_event_loop(raw_rx, event_tx, state, root, cancel).await;
        }));

        info!("watching {}", self.root.display());
        Ok(event_rx)
    }

    /// Release the native subscription and stop the classification loop.
    /// The watch handle is gone when this returns, so a new watcher can
    /// start on the same root immediately afterwards.
    pub async fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            let _ = watcher.unwatch(&self.root);
        }
        self.cancel.cancel();
        if let Some(task) = self.loop_task.take() {
            let _ = task.await;
        }
        info!("stopped watching {}", self.root.display());
    }

    /// Check if the subscription is active.
    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }
}

/// Rename halves awaiting their counterpart, plus the renames already
/// reported through pairing so a trailing `Both` notification for the same
/// rename is not reported twice.
#[derive(Default)]
struct RenameTracker {
    pending: Vec<PendingRename>,
    reported: Vec<(usize, Instant)>,
}

struct PendingRename {
    /// Root-relative old path; `None` when it was excluded or outside the
    /// root.
    rel: Option<String>,
    tracker: Option<usize>,
    seen: Instant,
}

impl RenameTracker {
    fn record_from(&mut self, rel: Option<String>, tracker: Option<usize>) {
        self.pending.push(PendingRename {
            rel,
            tracker,
            seen: Instant::now(),
        });
    }

    /// Pair a rename-to with a pending from half: by tracker when one is
    /// present, otherwise the oldest pending entry.
    fn pair_to(&mut self, tracker: Option<usize>) -> Option<PendingRename> {
        let index = match tracker {
            Some(id) => self.pending.iter().position(|p| p.tracker == Some(id)),
            None => (!self.pending.is_empty()).then_some(0),
        }?;
        let pending = self.pending.remove(index);
        if let Some(id) = pending.tracker {
            self.reported.push((id, Instant::now()));
        }
        Some(pending)
    }

    /// Whether a `Both` notification duplicates a rename already reported
    /// through From/To pairing.
    fn was_reported(&mut self, tracker: Option<usize>) -> bool {
        let Some(id) = tracker else { return false };
        match self.reported.iter().position(|(t, _)| *t == id) {
            Some(index) => {
                self.reported.remove(index);
                true
            }
            None => false,
        }
    }

    fn discard_pending(&mut self, tracker: Option<usize>) {
        if let Some(id) = tracker {
            self.pending.retain(|p| p.tracker != Some(id));
        }
    }

    /// Drop expired bookkeeping and return the old paths whose rename-to
    /// never arrived.
    fn expire(&mut self, window: Duration) -> Vec<String> {
        let now = Instant::now();
        self.reported
            .retain(|(_, seen)| now.duration_since(*seen) < window);

        let mut orphaned = Vec::new();
        let mut index = 0;
        while index < self.pending.len() {
            if now.duration_since(self.pending[index].seen) >= window {
                if let Some(rel) = self.pending.remove(index).rel {
                    orphaned.push(rel);
                }
            } else {
                index += 1;
            }
        }
        orphaned
    }

    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.reported.is_empty()
    }
}

async fn run_event_loop(
    mut raw_rx: mpsc::Receiver<notify::Event>,
    event_tx: mpsc::Sender<ChangeEvent>,
    state: Arc<WatchState>,
    root: PathBuf,
    cancel: CancellationToken,
) {
    let mut renames = RenameTracker::default();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(RENAME_PAIR_WINDOW), if !renames.is_idle() => {
                flush_renames(&mut renames, &event_tx).await;
            }
            maybe_event = raw_rx.recv() => {
                let Some(raw) = maybe_event else { break };
                handle_raw_event(raw, &state, &root, &event_tx, &mut renames).await;
                flush_renames(&mut renames, &event_tx).await;
            }
        }
    }
    debug!("event loop for {} exited", root.display());
}

async fn handle_raw_event(
    event: notify::Event,
    state: &WatchState,
    root: &Path,
    event_tx: &mpsc::Sender<ChangeEvent>,
    renames: &mut RenameTracker,
) {
    let spec = state.current_spec().await;
    let tracker = event.attrs.tracker();

    match event.kind {
        EventKind::Create(_) => {
            for path in &event.paths {
                if let Some(rel) = accepted(path, root, spec.as_ref()) {
                    emit(event_tx, ChangeEvent::new(ChangeKind::Created, rel)).await;
                }
            }
        }
        EventKind::Remove(_) => {
            for path in &event.paths {
                if let Some(rel) = accepted(path, root, spec.as_ref()) {
                    emit(event_tx, ChangeEvent::new(ChangeKind::Deleted, rel)).await;
                }
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if renames.was_reported(tracker) {
                return;
            }
            renames.discard_pending(tracker);
            let old = event
                .paths
                .first()
                .and_then(|p| accepted(p, root, spec.as_ref()));
            let new = event
                .paths
                .get(1)
                .and_then(|p| accepted(p, root, spec.as_ref()));
            emit_rename(event_tx, old, new).await;
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            let rel = event
                .paths
                .first()
                .and_then(|p| accepted(p, root, spec.as_ref()));
            renames.record_from(rel, tracker);
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            let new = event
                .paths
                .first()
                .and_then(|p| accepted(p, root, spec.as_ref()));
            match renames.pair_to(tracker) {
                Some(pending) => emit_rename(event_tx, pending.rel, new).await,
                None => {
                    if let Some(rel) = new {
                        emit(event_tx, ChangeEvent::new(ChangeKind::Created, rel)).await;
                    }
                }
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            // Rename direction unknown on this platform; probe existence.
            for path in &event.paths {
                if let Some(rel) = accepted(path, root, spec.as_ref()) {
                    let kind = if path.exists() {
                        ChangeKind::Created
                    } else {
                        ChangeKind::Deleted
                    };
                    emit(event_tx, ChangeEvent::new(kind, rel)).await;
                }
            }
        }
        EventKind::Modify(_) => {
            for path in &event.paths {
                if let Some(rel) = accepted(path, root, spec.as_ref()) {
                    emit(event_tx, ChangeEvent::new(ChangeKind::Modified, rel)).await;
                }
            }
        }
        EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
    }
}

/// Report a rename given which halves are observable. A half is `None` when
/// excluded or outside the root, so a move across the exclusion boundary
/// degrades to a plain create or delete.
async fn emit_rename(
    event_tx: &mpsc::Sender<ChangeEvent>,
    old: Option<String>,
    new: Option<String>,
) {
    match (old, new) {
        (Some(old), Some(new)) => emit(event_tx, ChangeEvent::moved(old, new)).await,
        (Some(old), None) => emit(event_tx, ChangeEvent::new(ChangeKind::Deleted, old)).await,
        (None, Some(new)) => emit(event_tx, ChangeEvent::new(ChangeKind::Created, new)).await,
        (None, None) => {}
    }
}

async fn flush_renames(renames: &mut RenameTracker, event_tx: &mpsc::Sender<ChangeEvent>) {
    for rel in renames.expire(RENAME_PAIR_WINDOW) {
        // The matching rename-to never arrived; as far as the index is
        // concerned the path is gone.
        emit(event_tx, ChangeEvent::new(ChangeKind::Deleted, rel)).await;
    }
}

/// Root-relative path of an accepted event, `None` when the path is outside
/// the root or excluded by the current spec.
fn accepted(path: &Path, root: &Path, spec: &IgnoreSpec) -> Option<String> {
    let rel = relative_posix(path, root)?;
    if spec.is_excluded(&rel, path.is_dir()) {
        trace!("excluded: {rel}");
        None
    } else {
        Some(rel)
    }
}

async fn emit(event_tx: &mpsc::Sender<ChangeEvent>, event: ChangeEvent) {
    if event_tx.send(event).await.is_err() {
        debug!("event receiver dropped");
    }
}
