// src/runloop/mod.rs

//! Run loops that drive an [`ExecutionPlan`] to a single exit code.
//!
//! - [`sequential`]: one handle at a time, output echoed live, stop at the
//!   first failure.
//! - [`parallel`]: all handles at once, output polled and filtered through
//!   [`markers`], first failure kills the rest.

use std::sync::Arc;
use std::time::Duration;

use tracing::error;

use crate::orchestrator::ExecutionPlan;
use crate::process::{ConsoleSink, LineSink, ProcessHandle, ProcessOptions, ProcessRegistry};
use crate::types::{ConcurrencyMode, SUCCESS_EXIT_CODE};

pub mod markers;
pub mod parallel;
pub mod sequential;

pub use markers::{IMPORTANT_MARKERS, ImportanceFilter};
pub use parallel::run_parallel;
pub use sequential::run_sequential;

/// Label used for lines the run loop itself prints.
pub const RUNNER_LABEL: &str = "cirun";

/// Knobs shared by both loops.
#[derive(Debug, Clone)]
pub struct RunLoopOptions {
    /// Print every line, not just important ones (parallel mode).
    pub verbose: bool,
    /// How long each `get_next_line` call may wait in the parallel loop.
    pub poll_interval: Duration,
    pub sink: Arc<dyn LineSink>,
    pub filter: ImportanceFilter,
    pub reader_join_grace: Duration,
    pub registry: Option<ProcessRegistry>,
}

impl Default for RunLoopOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            poll_interval: Duration::from_millis(10),
            sink: Arc::new(ConsoleSink::with_labels()),
            filter: ImportanceFilter::default(),
            reader_join_grace: Duration::from_secs(2),
            registry: None,
        }
    }
}

/// A handle paired with its watchdog bound.
#[derive(Debug)]
pub struct PlannedProcess {
    pub handle: ProcessHandle,
    pub timeout: Option<Duration>,
}

impl PlannedProcess {
    pub fn new(handle: ProcessHandle) -> Self {
        Self {
            handle,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteResult {
    pub label: String,
    pub exit_code: i32,
}

/// Aggregate result of a run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub exit_code: i32,
    /// One entry per handle that was reaped, in reap order.
    pub results: Vec<SuiteResult>,
    /// Label of the handle that ended the run, if any.
    pub failed: Option<String>,
}

impl RunOutcome {
    fn success(results: Vec<SuiteResult>) -> Self {
        Self {
            exit_code: SUCCESS_EXIT_CODE,
            results,
            failed: None,
        }
    }

    fn failure(exit_code: i32, results: Vec<SuiteResult>, label: &str) -> Self {
        Self {
            exit_code,
            results,
            failed: Some(label.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == SUCCESS_EXIT_CODE
    }

    pub fn code_for(&self, label: &str) -> Option<i32> {
        self.results
            .iter()
            .find(|r| r.label == label)
            .map(|r| r.exit_code)
    }
}

/// Build handles from the plan's factories and drive them in the plan's mode.
pub async fn run_plan(plan: &ExecutionPlan, options: &RunLoopOptions) -> RunOutcome {
    // Sequential runs stream everything; parallel runs filter in the loop.
    let echo = plan.mode == ConcurrencyMode::Sequential;
    let processes: Vec<PlannedProcess> = plan
        .entries
        .iter()
        .map(|entry| PlannedProcess {
            handle: entry.create_handle(ProcessOptions {
                echo,
                sink: Arc::clone(&options.sink),
                reader_join_grace: options.reader_join_grace,
                registry: options.registry.clone(),
            }),
            timeout: entry.timeout,
        })
        .collect();

    match plan.mode {
        ConcurrencyMode::Sequential => run_sequential(processes, options).await,
        ConcurrencyMode::Parallel => run_parallel(processes, options).await,
    }
}

/// Print the failing command and its exit code.
fn report_failure(options: &RunLoopOptions, handle: &ProcessHandle, message: &str) {
    error!(label = %handle.label(), "{message}");
    options
        .sink
        .write_line(RUNNER_LABEL, &format!("FAILED [{}] {message}", handle.label()));
}
