//! Service orchestration.
//!
//! The `WatchService` owns the watch loop, the delivery loop and the
//! reconciler loop, plus the state they share. Startup seeds the shared
//! state with the initial spec load and tree walk; shutdown cancels both
//! loops and releases the native subscription before returning.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::WatchConfig;
use crate::error::{Result, WatchError};
use crate::event::{ChangeEvent, NotificationBatch};
use crate::matcher::IgnoreSpec;
use crate::notifier::IngestNotifier;
use crate::reconcile::{excluded_files, IgnoreReconciler};
use crate::state::WatchState;
use crate::watcher::DirectoryWatcher;

/// How many accepted events are drained into a single delivery batch.
const DELIVERY_BATCH_SIZE: usize = 64;

/// Orchestrates the watch and reconciliation loops over one directory tree.
pub struct WatchService {
    config: WatchConfig,
    state: Arc<WatchState>,
    watcher: Option<DirectoryWatcher>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl WatchService {
    /// Create a service for `config`. Nothing runs until [`start`] is
    /// called.
    ///
    /// [`start`]: WatchService::start
    pub fn new(config: WatchConfig) -> Self {
        Self {
            config,
            state: Arc::new(WatchState::new(IgnoreSpec::empty())),
            watcher: None,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Load the initial spec, seed the excluded-path snapshot and launch
    /// the three loops. Fails when the root is missing or not a directory.
    pub async fn start(&mut self) -> Result<()> {
        if self.watcher.is_some() {
            return Err(WatchError::AlreadyRunning);
        }

        // Reported paths are relative to the canonical root.
        self.config.root = self.config.root.canonicalize().map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => {
                WatchError::RootNotFound(self.config.root.display().to_string())
            }
            _ => WatchError::Io(err),
        })?;

        // Seed the shared state before the subscription starts so the very
        // first raw event is already classified against the real spec.
        let ignore_path = self.config.ignore_path();
        let spec = IgnoreSpec::load(&self.config.root, &ignore_path);
        let excluded = excluded_files(&self.config.root, &spec);
        debug!(
            "initial walk: {} path(s) excluded by {}",
            excluded.len(),
            ignore_path.display()
        );
        self.state.replace_spec(spec).await;
        self.state.replace_excluded(excluded).await;

        self.cancel = CancellationToken::new();
        let mut watcher = DirectoryWatcher::new(
            self.config.root.clone(),
            self.state.clone(),
            self.cancel.child_token(),
        );
        let events = watcher.start()?;
        self.watcher = Some(watcher);

        let notifier = IngestNotifier::new(self.config.endpoint.clone());

        self.tasks.push(tokio::spawn(deliver_events(
            events,
            notifier.clone(),
            self.config.project_id.clone(),
            self.cancel.child_token(),
        )));

        let reconciler = IgnoreReconciler::new(&self.config, self.state.clone(), notifier);
        self.tasks
            .push(tokio::spawn(reconciler.run(self.cancel.child_token())));

        info!("watch service started for {}", self.config.root.display());
        Ok(())
    }

    /// Stop both loops and release the filesystem subscription before
    /// returning. The service can be started again afterwards.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop().await;
        }
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        info!("watch service stopped");
    }

    /// Check if the service is running.
    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    /// The state shared between the loops.
    pub fn state(&self) -> &Arc<WatchState> {
        &self.state
    }
}

/// Drains accepted watcher events and delivers them in small batches.
/// Delivery is synchronous with respect to this loop, so a slow endpoint
/// back-pressures the event channel rather than capture being decoupled.
async fn deliver_events(
    mut events: mpsc::Receiver<ChangeEvent>,
    notifier: IngestNotifier,
    project_id: String,
    cancel: CancellationToken,
) {
    let mut buffer: Vec<ChangeEvent> = Vec::with_capacity(DELIVERY_BATCH_SIZE);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = events.recv_many(&mut buffer, DELIVERY_BATCH_SIZE) => {
                if received == 0 {
                    break; // channel closed
                }
                let batch = NotificationBatch {
                    project_id: project_id.clone(),
                    events: std::mem::take(&mut buffer),
                };
                notifier.send(&batch).await;
            }
        }
    }
    debug!("delivery loop exited");
}
