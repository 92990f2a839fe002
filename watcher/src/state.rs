//! State shared between the watch loop and the reconciler.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::matcher::IgnoreSpec;

/// The current ignore spec and the excluded-path snapshot derived from it.
///
/// The reconciler is the only writer; the watch loop only reads the spec.
/// Both values are replaced wholesale, never mutated in place, so a reader
/// observes either the old or the new spec in full.
pub struct WatchState {
    spec: RwLock<Arc<IgnoreSpec>>,
    excluded: RwLock<BTreeSet<String>>,
}

impl WatchState {
    /// Create shared state holding `spec` and an empty excluded set.
    pub fn new(spec: IgnoreSpec) -> Self {
        Self {
            spec: RwLock::new(Arc::new(spec)),
            excluded: RwLock::new(BTreeSet::new()),
        }
    }

    /// The spec that is current right now. The lock is held only for the
    /// pointer read; callers classify against the returned handle.
    pub async fn current_spec(&self) -> Arc<IgnoreSpec> {
        self.spec.read().await.clone()
    }

    /// Replace the current spec wholesale.
    pub async fn replace_spec(&self, spec: IgnoreSpec) {
        *self.spec.write().await = Arc::new(spec);
    }

    /// The excluded-path snapshot from the most recent full walk.
    pub async fn excluded_snapshot(&self) -> BTreeSet<String> {
        self.excluded.read().await.clone()
    }

    /// Replace the excluded-path snapshot, returning the previous one.
    pub async fn replace_excluded(&self, excluded: BTreeSet<String>) -> BTreeSet<String> {
        std::mem::replace(&mut *self.excluded.write().await, excluded)
    }
}
