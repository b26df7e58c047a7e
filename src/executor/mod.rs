// src/executor/mod.rs

//! Fan-out executor.
//!
//! Runs many independent [`WorkItem`]s (one board build, one test suite, one
//! dependency install) under a bounded worker pool and cancels everything
//! still outstanding the moment one item fails hard.
//!
//! - [`fanout`] holds the [`Executor`] and its `run_all` loop.
//! - [`work_item`] defines the [`WorkItem`] contract, results, and the
//!   process-backed [`ProcessWorkItem`].
//! - [`active`] is the per-run shared state (in-flight handles, first error).

use std::time::Duration;

pub mod active;
pub mod fanout;
pub mod work_item;

pub use fanout::Executor;
pub use work_item::{
    FailureKind, ItemResult, ItemStatus, ProcessWorkItem, WorkContext, WorkFuture, WorkItem,
};

/// How many workers to use for a given number of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPolicy {
    /// Network/disk bound work: one worker per item.
    IoBound,
    /// Compilation and similar: `min(cpu_count, item_count)`.
    CpuBound,
    /// Explicit override.
    Fixed(usize),
}

impl WorkerPolicy {
    pub fn workers_for(&self, item_count: usize) -> usize {
        let n = match *self {
            WorkerPolicy::IoBound => item_count,
            WorkerPolicy::CpuBound => cpu_count().min(item_count),
            WorkerPolicy::Fixed(n) => n,
        };
        n.max(1)
    }
}

fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Executor configuration, passed in explicitly instead of global toggles.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub policy: WorkerPolicy,
    /// Default per-item bound; items may override it.
    pub item_timeout: Option<Duration>,
    /// Stop the run at the first hard failure. Off means every item runs
    /// and failures are only reported.
    pub cancel_on_failure: bool,
}

impl ExecutorConfig {
    pub fn io_bound() -> Self {
        Self {
            policy: WorkerPolicy::IoBound,
            item_timeout: None,
            cancel_on_failure: true,
        }
    }

    pub fn cpu_bound() -> Self {
        Self {
            policy: WorkerPolicy::CpuBound,
            ..Self::io_bound()
        }
    }

    /// Replace the policy with a fixed worker count.
    pub fn with_max_workers(mut self, n: usize) -> Self {
        self.policy = WorkerPolicy::Fixed(n);
        self
    }

    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = Some(timeout);
        self
    }

    pub fn keep_going(mut self) -> Self {
        self.cancel_on_failure = false;
        self
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::cpu_bound()
    }
}

/// Outcome of one `run_all` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub overall_ok: bool,
    /// In completion order. After a cancel this holds only what finished
    /// before the failure was observed.
    pub results: Vec<ItemResult>,
    /// The failure that aborted the run, or the first non-success result.
    pub first_error: Option<ItemResult>,
}

impl RunReport {
    pub fn empty() -> Self {
        Self {
            overall_ok: true,
            results: Vec::new(),
            first_error: None,
        }
    }

    /// Exit code for the whole run: 0, or the first failure's code (1 if it
    /// has none).
    pub fn exit_code(&self) -> i32 {
        match &self.first_error {
            None if self.overall_ok => crate::types::SUCCESS_EXIT_CODE,
            Some(err) => err
                .exit_code
                .filter(|c| *c != 0)
                .unwrap_or(crate::types::FAILURE_EXIT_CODE),
            None => crate::types::FAILURE_EXIT_CODE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_bound_uses_one_worker_per_item() {
        assert_eq!(WorkerPolicy::IoBound.workers_for(12), 12);
        assert_eq!(WorkerPolicy::IoBound.workers_for(0), 1);
    }

    #[test]
    fn cpu_bound_never_exceeds_item_count() {
        assert_eq!(WorkerPolicy::CpuBound.workers_for(1), 1);
        assert!(WorkerPolicy::CpuBound.workers_for(10_000) <= cpu_count());
    }

    #[test]
    fn fixed_is_at_least_one() {
        assert_eq!(WorkerPolicy::Fixed(0).workers_for(5), 1);
        assert_eq!(WorkerPolicy::Fixed(3).workers_for(5), 3);
    }

    #[test]
    fn report_exit_code_follows_first_error() {
        assert_eq!(RunReport::empty().exit_code(), 0);
        let failed = ItemResult::hard_failure(
            "x",
            FailureKind::Timeout,
            Some(crate::types::WATCHDOG_EXIT_CODE),
            "slow",
            Duration::ZERO,
        );
        let report = RunReport {
            overall_ok: false,
            results: vec![failed.clone()],
            first_error: Some(failed),
        };
        assert_eq!(report.exit_code(), 2);
    }
}
