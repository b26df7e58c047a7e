// src/executor/active.rs

//! Shared state of one `run_all` call: in-flight handles, the cancelled
//! flag and the first-error slot, all behind a single mutex.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::process::ProcessHandle;

use super::work_item::ItemResult;

#[derive(Default)]
struct Inner {
    next_id: u64,
    handles: HashMap<u64, Arc<ProcessHandle>>,
    cancelled: bool,
    first_error: Option<ItemResult>,
}

#[derive(Default)]
pub struct ActiveSet {
    inner: Mutex<Inner>,
}

impl fmt::Debug for ActiveSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("ActiveSet")
            .field("in_flight", &inner.handles.len())
            .field("cancelled", &inner.cancelled)
            .finish()
    }
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    pub fn in_flight(&self) -> usize {
        self.lock().handles.len()
    }

    /// Add `handle` to the in-flight set. If the run is already cancelled the
    /// handle is killed instead and `None` is returned.
    pub fn track(self: &Arc<Self>, handle: &Arc<ProcessHandle>) -> Option<TrackGuard> {
        let mut inner = self.lock();
        if inner.cancelled {
            handle.kill();
            return None;
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handles.insert(id, Arc::clone(handle));
        Some(TrackGuard {
            id,
            set: Arc::clone(self),
        })
    }

    fn untrack(&self, id: u64) {
        self.lock().handles.remove(&id);
    }

    /// Record `failure` (if it is the first), mark the run cancelled and kill
    /// every in-flight handle. Returns the recorded first error.
    ///
    /// Marking and killing happen under the same lock, so a handle whose item
    /// has already untracked it (because it was reaped) is never touched.
    pub fn cancel_with(&self, failure: ItemResult) -> ItemResult {
        let mut inner = self.lock();
        inner.cancelled = true;
        let first = inner.first_error.get_or_insert(failure).clone();

        let mut killed = 0usize;
        for handle in inner.handles.values() {
            if handle.kill() {
                killed += 1;
            }
        }
        info!(
            failed = %first.name,
            in_flight = inner.handles.len(),
            killed,
            "cancelling outstanding work"
        );
        first
    }
}

/// Removes its handle from the in-flight set when dropped.
pub struct TrackGuard {
    id: u64,
    set: Arc<ActiveSet>,
}

impl fmt::Debug for TrackGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackGuard").field("id", &self.id).finish()
    }
}

impl Drop for TrackGuard {
    fn drop(&mut self) {
        debug!(id = self.id, "untracking handle");
        self.set.untrack(self.id);
    }
}
