// src/runloop/parallel.rs

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::CirunError;
use crate::process::{LineRead, ProcessHandle};
use crate::types::{FAILURE_EXIT_CODE, WATCHDOG_EXIT_CODE};

use super::{PlannedProcess, RunLoopOptions, RunOutcome, SuiteResult, report_failure};

struct Active {
    planned: PlannedProcess,
    started_at: Instant,
}

impl Active {
    fn timed_out(&self) -> bool {
        self.planned
            .timeout
            .is_some_and(|limit| self.started_at.elapsed() > limit)
    }
}

/// Start every process, then poll them round-robin until all have exited or
/// one fails.
///
/// Lines are printed as they arrive when `verbose` is set or they match the
/// importance filter. A non-zero exit (or a watchdog timeout) kills every
/// other active process and ends the run with that code.
pub async fn run_parallel(processes: Vec<PlannedProcess>, options: &RunLoopOptions) -> RunOutcome {
    let mut active: Vec<Active> = Vec::with_capacity(processes.len());
    let mut results = Vec::with_capacity(processes.len());

    for planned in processes {
        info!(label = %planned.handle.label(), cmd = %planned.handle.spec(), "starting (parallel)");
        if let Err(e) = planned.handle.start() {
            report_failure(options, &planned.handle, &e.to_string());
            kill_all(&active);
            return RunOutcome::failure(FAILURE_EXIT_CODE, results, planned.handle.label());
        }
        active.push(Active {
            planned,
            started_at: Instant::now(),
        });
    }

    while !active.is_empty() {
        let mut i = 0;
        while i < active.len() {
            drain_available(&active[i].planned.handle, options, options.poll_interval).await;

            if active[i].planned.handle.poll().is_some() {
                let done = active.remove(i);
                let handle = &done.planned.handle;
                let code = handle.wait().await.unwrap_or_else(|e| {
                    warn!(label = %handle.label(), error = %e, "wait failed");
                    FAILURE_EXIT_CODE
                });
                // The reader has been joined; print whatever it left behind.
                drain_remaining(handle, options).await;

                let label = handle.label().to_string();
                results.push(SuiteResult {
                    label: label.clone(),
                    exit_code: code,
                });

                if code != 0 {
                    kill_all(&active);
                    let err = CirunError::Runtime {
                        command: handle.spec().to_string(),
                        code,
                    };
                    report_failure(options, handle, &err.to_string());
                    return RunOutcome::failure(code, results, &label);
                }
                info!(label = %label, elapsed = ?done.started_at.elapsed(), "finished");
                continue;
            }

            if active[i].timed_out() {
                let done = active.remove(i);
                let handle = &done.planned.handle;
                handle.kill();
                let _ = handle.wait().await;
                kill_all(&active);

                let label = handle.label().to_string();
                results.push(SuiteResult {
                    label: label.clone(),
                    exit_code: WATCHDOG_EXIT_CODE,
                });
                let err = CirunError::Timeout {
                    command: handle.spec().to_string(),
                    elapsed: done.started_at.elapsed(),
                };
                report_failure(options, handle, &err.to_string());
                return RunOutcome::failure(WATCHDOG_EXIT_CODE, results, &label);
            }

            i += 1;
        }
    }

    RunOutcome::success(results)
}

/// Upper bound per visit, so one chatty process cannot starve the others.
const MAX_LINES_PER_PASS: usize = 512;

/// Print the lines that are already available (or arrive within `wait`).
async fn drain_available(handle: &ProcessHandle, options: &RunLoopOptions, wait: Duration) {
    for _ in 0..MAX_LINES_PER_PASS {
        let LineRead::Line(line) = handle.get_next_line(wait).await else {
            return;
        };
        if options.verbose || options.filter.is_important(&line) {
            options.sink.write_line(handle.label(), &line);
        }
    }
}

/// Print everything left after the process has been reaped.
async fn drain_remaining(handle: &ProcessHandle, options: &RunLoopOptions) {
    while let LineRead::Line(line) = handle.get_next_line(Duration::ZERO).await {
        if options.verbose || options.filter.is_important(&line) {
            options.sink.write_line(handle.label(), &line);
        }
    }
}

fn kill_all(active: &[Active]) {
    for other in active {
        if other.planned.handle.kill() {
            debug!(label = %other.planned.handle.label(), "killed after sibling failure");
        }
    }
}
