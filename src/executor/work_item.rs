// src/executor/work_item.rs

//! Units of work scheduled by the fan-out executor.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::CirunError;
use crate::process::{CommandSpec, LineRead, ProcessHandle, ProcessOptions, ProcessState};
use crate::types::WATCHDOG_EXIT_CODE;

use super::active::{ActiveSet, TrackGuard};

/// Why an item failed hard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The command could not be spawned.
    Startup,
    /// The command exited non-zero.
    Runtime,
    /// The command exceeded its time bound and was killed.
    Timeout,
    /// The worker itself panicked.
    Panic,
}

/// Final status of one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Success,
    /// Non-zero exit that the item was told not to escalate (`check = false`).
    SoftFailure,
    /// A failure that cancels the rest of the run.
    HardFailure(FailureKind),
    /// Stopped because a sibling failed.
    Cancelled,
}

/// What the executor learns about a finished item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResult {
    pub name: String,
    pub status: ItemStatus,
    pub exit_code: Option<i32>,
    pub message: String,
    pub elapsed: Duration,
}

impl ItemResult {
    pub fn success(name: impl Into<String>, exit_code: Option<i32>, elapsed: Duration) -> Self {
        Self {
            name: name.into(),
            status: ItemStatus::Success,
            exit_code,
            message: "ok".to_string(),
            elapsed,
        }
    }

    pub fn soft_failure(
        name: impl Into<String>,
        exit_code: Option<i32>,
        message: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            status: ItemStatus::SoftFailure,
            exit_code,
            message: message.into(),
            elapsed,
        }
    }

    pub fn hard_failure(
        name: impl Into<String>,
        kind: FailureKind,
        exit_code: Option<i32>,
        message: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            status: ItemStatus::HardFailure(kind),
            exit_code,
            message: message.into(),
            elapsed,
        }
    }

    pub fn cancelled(name: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            name: name.into(),
            status: ItemStatus::Cancelled,
            exit_code: None,
            message: "cancelled after a sibling failed".to_string(),
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Success
    }

    pub fn is_hard_failure(&self) -> bool {
        matches!(self.status, ItemStatus::HardFailure(_))
    }
}

/// Future returned by [`WorkItem::run`].
pub type WorkFuture = Pin<Box<dyn Future<Output = ItemResult> + Send>>;

/// One independently schedulable unit of work.
///
/// Items that own a [`ProcessHandle`] must register it with
/// [`WorkContext::track`] so the executor can kill it when a sibling fails.
pub trait WorkItem: Send {
    fn name(&self) -> &str;

    fn run(self: Box<Self>, ctx: WorkContext) -> WorkFuture;
}

/// Per-item view of the executor's shared state.
#[derive(Debug, Clone)]
pub struct WorkContext {
    item: String,
    active: Arc<ActiveSet>,
    timeout: Option<Duration>,
}

impl WorkContext {
    pub(crate) fn new(item: String, active: Arc<ActiveSet>, timeout: Option<Duration>) -> Self {
        Self {
            item,
            active,
            timeout,
        }
    }

    pub fn item(&self) -> &str {
        &self.item
    }

    /// Default time bound configured on the executor.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.active.is_cancelled()
    }

    /// Register a running handle for cancellation.
    ///
    /// Returns `None` if the run has already been cancelled; the handle has
    /// then been killed and the caller should stop.
    pub fn track(&self, handle: &Arc<ProcessHandle>) -> Option<TrackGuard> {
        self.active.track(handle)
    }
}

const LINE_POLL: Duration = Duration::from_millis(100);
const DEFAULT_TAIL_LINES: usize = 20;

/// A work item backed by one external command.
#[derive(Debug, Clone)]
pub struct ProcessWorkItem {
    spec: CommandSpec,
    options: ProcessOptions,
    check: bool,
    timeout: Option<Duration>,
    tail_lines: usize,
}

impl ProcessWorkItem {
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            options: ProcessOptions::default(),
            check: true,
            timeout: None,
            tail_lines: DEFAULT_TAIL_LINES,
        }
    }

    pub fn with_options(mut self, options: ProcessOptions) -> Self {
        self.options = options;
        self
    }

    /// When `false`, a non-zero exit is recorded as a soft failure and does
    /// not cancel siblings.
    pub fn check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    /// Per-item bound, overriding the executor default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn tail_lines(mut self, n: usize) -> Self {
        self.tail_lines = n;
        self
    }

    async fn execute(self, ctx: WorkContext) -> ItemResult {
        let started_at = Instant::now();
        let name = ctx.item().to_string();
        let handle = Arc::new(ProcessHandle::new(self.spec.clone(), self.options.clone()));

        if let Err(e) = handle.start() {
            warn!(item = %name, error = %e, "work item failed to start");
            return ItemResult::hard_failure(
                name,
                FailureKind::Startup,
                None,
                e.to_string(),
                started_at.elapsed(),
            );
        }

        let Some(_guard) = ctx.track(&handle) else {
            let _ = handle.wait().await;
            return ItemResult::cancelled(name, started_at.elapsed());
        };

        // A bound too large to represent is no bound at all.
        let deadline = self
            .timeout
            .or(ctx.timeout())
            .and_then(|t| started_at.checked_add(t));
        let mut tail: VecDeque<String> = VecDeque::with_capacity(self.tail_lines);

        loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return self.timed_out(&handle, &tail, started_at).await;
            }
            match handle.get_next_line(LINE_POLL).await {
                LineRead::Line(line) => {
                    if self.tail_lines > 0 {
                        if tail.len() == self.tail_lines {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
                // Exited but a grandchild may still hold the pipe open;
                // `wait()` gives the reader its grace period.
                LineRead::Empty if handle.poll().is_some() => break,
                LineRead::Empty => {}
                LineRead::Closed => break,
            }
        }

        let code = match handle.wait().await {
            Ok(code) => code,
            Err(e) => {
                return ItemResult::hard_failure(
                    name,
                    FailureKind::Runtime,
                    None,
                    e.to_string(),
                    started_at.elapsed(),
                );
            }
        };
        let elapsed = started_at.elapsed();

        if handle.state() == ProcessState::Killed {
            debug!(item = %name, exit_code = code, "work item was killed by cancellation");
            return ItemResult::cancelled(name, elapsed);
        }

        if code == 0 {
            info!(item = %name, ?elapsed, "work item succeeded");
            return ItemResult::success(name, Some(code), elapsed);
        }

        let err = CirunError::Runtime {
            command: self.spec.to_string(),
            code,
        };
        let message = with_tail(err.to_string(), &tail);
        if self.check {
            warn!(item = %name, exit_code = code, "work item failed");
            ItemResult::hard_failure(name, FailureKind::Runtime, Some(code), message, elapsed)
        } else {
            info!(item = %name, exit_code = code, "work item failed (not checked)");
            ItemResult::soft_failure(name, Some(code), message, elapsed)
        }
    }

    async fn timed_out(
        &self,
        handle: &ProcessHandle,
        tail: &VecDeque<String>,
        started_at: Instant,
    ) -> ItemResult {
        handle.kill();
        let _ = handle.wait().await;
        let elapsed = started_at.elapsed();
        let err = CirunError::Timeout {
            command: self.spec.to_string(),
            elapsed,
        };
        warn!(item = %self.spec.label, error = %err, "work item killed by watchdog");
        ItemResult::hard_failure(
            self.spec.label.clone(),
            FailureKind::Timeout,
            Some(WATCHDOG_EXIT_CODE),
            with_tail(err.to_string(), tail),
            elapsed,
        )
    }
}

fn with_tail(message: String, tail: &VecDeque<String>) -> String {
    if tail.is_empty() {
        return message;
    }
    let mut out = message;
    out.push_str("\n--- last output ---");
    for line in tail {
        out.push('\n');
        out.push_str(line);
    }
    out
}

impl WorkItem for ProcessWorkItem {
    fn name(&self) -> &str {
        &self.spec.label
    }

    fn run(self: Box<Self>, ctx: WorkContext) -> WorkFuture {
        Box::pin(async move { self.execute(ctx).await })
    }
}
