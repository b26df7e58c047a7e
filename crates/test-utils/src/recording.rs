//! Work items for executor tests that record what they did.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cirun::executor::{FailureKind, ItemResult, WorkContext, WorkFuture, WorkItem};
use cirun::process::{CommandSpec, ProcessHandle, ProcessOptions, ProcessState};
use tokio::time::Instant;

/// Every handle a [`RecordingItem`] started, in start order.
pub type HandleRegistry = Arc<Mutex<Vec<Arc<ProcessHandle>>>>;

pub fn new_registry() -> HandleRegistry {
    Arc::new(Mutex::new(Vec::new()))
}

/// Runs a real command and leaves its handle in a shared registry, so a test
/// can inspect the final state of every process after the executor returns.
pub struct RecordingItem {
    spec: CommandSpec,
    registry: HandleRegistry,
}

impl RecordingItem {
    pub fn new(spec: CommandSpec, registry: &HandleRegistry) -> Self {
        Self {
            spec,
            registry: Arc::clone(registry),
        }
    }

    pub fn boxed(spec: CommandSpec, registry: &HandleRegistry) -> Box<dyn WorkItem> {
        Box::new(Self::new(spec, registry))
    }
}

impl WorkItem for RecordingItem {
    fn name(&self) -> &str {
        &self.spec.label
    }

    fn run(self: Box<Self>, ctx: WorkContext) -> WorkFuture {
        Box::pin(async move {
            let started_at = Instant::now();
            let name = self.spec.label.clone();
            let handle = Arc::new(ProcessHandle::new(self.spec, ProcessOptions::default()));

            if let Err(e) = handle.start() {
                return ItemResult::hard_failure(
                    name,
                    FailureKind::Startup,
                    None,
                    e.to_string(),
                    started_at.elapsed(),
                );
            }
            self.registry.lock().unwrap().push(Arc::clone(&handle));

            let Some(_guard) = ctx.track(&handle) else {
                let _ = handle.wait().await;
                return ItemResult::cancelled(name, started_at.elapsed());
            };

            match handle.wait().await {
                Ok(0) => ItemResult::success(name, Some(0), started_at.elapsed()),
                Ok(_) if handle.state() == ProcessState::Killed => {
                    ItemResult::cancelled(name, started_at.elapsed())
                }
                Ok(code) => ItemResult::hard_failure(
                    name,
                    FailureKind::Runtime,
                    Some(code),
                    format!("exited with {code}"),
                    started_at.elapsed(),
                ),
                Err(e) => ItemResult::hard_failure(
                    name,
                    FailureKind::Runtime,
                    None,
                    e.to_string(),
                    started_at.elapsed(),
                ),
            }
        })
    }
}

/// Tracks how many [`CountingItem`]s run at once.
#[derive(Debug, Default, Clone)]
pub struct ConcurrencyGauge {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

impl ConcurrencyGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

/// A process-free item that holds a worker slot for `hold`, then succeeds
/// or fails hard.
pub struct CountingItem {
    name: String,
    hold: Duration,
    fail: bool,
    gauge: ConcurrencyGauge,
}

impl CountingItem {
    pub fn ok(name: &str, hold: Duration, gauge: &ConcurrencyGauge) -> Box<dyn WorkItem> {
        Box::new(Self {
            name: name.to_string(),
            hold,
            fail: false,
            gauge: gauge.clone(),
        })
    }

    pub fn failing(name: &str, hold: Duration, gauge: &ConcurrencyGauge) -> Box<dyn WorkItem> {
        Box::new(Self {
            name: name.to_string(),
            hold,
            fail: true,
            gauge: gauge.clone(),
        })
    }
}

impl WorkItem for CountingItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self: Box<Self>, _ctx: WorkContext) -> WorkFuture {
        Box::pin(async move {
            self.gauge.enter();
            tokio::time::sleep(self.hold).await;
            self.gauge.leave();
            if self.fail {
                ItemResult::hard_failure(
                    self.name,
                    FailureKind::Runtime,
                    Some(3),
                    "told to fail",
                    self.hold,
                )
            } else {
                ItemResult::success(self.name, Some(0), self.hold)
            }
        })
    }
}
