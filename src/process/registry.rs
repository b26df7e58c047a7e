// src/process/registry.rs

//! Run-wide set of live processes, so an interrupt can stop all of them.
//!
//! Handles register themselves in `start()` when their options carry a
//! registry and drop out once their exit status is recorded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::handle::KillSwitch;

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    /// Set by `kill_all`; later registrations are refused.
    closed: bool,
    live: HashMap<u64, Entry>,
}

#[derive(Debug)]
struct Entry {
    switch: KillSwitch,
    exit: watch::Receiver<Option<i32>>,
}

/// Cheap to clone; all clones share one set.
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered processes that have not exited yet.
    pub fn len(&self) -> usize {
        self.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// `None` once the registry is closed: the caller must kill the process
    /// itself.
    pub(crate) fn register(
        &self,
        switch: KillSwitch,
        exit: watch::Receiver<Option<i32>>,
    ) -> Option<u64> {
        let mut inner = self.lock();
        if inner.closed {
            return None;
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.live.insert(id, Entry { switch, exit });
        Some(id)
    }

    pub(crate) fn unregister(&self, id: u64) {
        self.lock().live.remove(&id);
    }

    /// Close the registry and kill every live process group.
    ///
    /// Returns how many kills were issued.
    pub fn kill_all(&self) -> usize {
        let switches: Vec<KillSwitch> = {
            let mut inner = self.lock();
            inner.closed = true;
            inner.live.values().map(|e| e.switch.clone()).collect()
        };
        // Killing takes each handle's state lock; never under ours.
        switches.iter().filter(|s| s.kill()).count()
    }

    /// `kill_all`, then wait up to `grace` for every exit to be reaped.
    pub async fn kill_all_and_reap(&self, grace: Duration) -> usize {
        let killed = self.kill_all();
        let exits: Vec<watch::Receiver<Option<i32>>> =
            self.lock().live.values().map(|e| e.exit.clone()).collect();

        let reap = async {
            for mut exit in exits {
                let _ = exit.wait_for(Option::is_some).await;
            }
        };
        if timeout(grace, reap).await.is_err() {
            warn!(remaining = self.len(), ?grace, "processes not reaped in time");
        } else {
            debug!(killed, "all registered processes reaped");
        }
        killed
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
