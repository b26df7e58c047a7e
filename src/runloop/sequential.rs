// src/runloop/sequential.rs

use tokio::time::{Instant, timeout};
use tracing::{info, warn};

use crate::errors::CirunError;
use crate::types::{FAILURE_EXIT_CODE, WATCHDOG_EXIT_CODE};

use super::{PlannedProcess, RunLoopOptions, RunOutcome, SuiteResult, report_failure};

/// Run each process to completion before starting the next.
///
/// The first non-zero exit ends the run with that code; later processes are
/// never started.
pub async fn run_sequential(processes: Vec<PlannedProcess>, options: &RunLoopOptions) -> RunOutcome {
    let mut results = Vec::with_capacity(processes.len());

    for planned in processes {
        let handle = &planned.handle;
        let label = handle.label().to_string();
        info!(label = %label, cmd = %handle.spec(), "starting (sequential)");

        if let Err(e) = handle.start() {
            report_failure(options, handle, &e.to_string());
            return RunOutcome::failure(FAILURE_EXIT_CODE, results, &label);
        }
        let started_at = Instant::now();

        let waited = match planned.timeout {
            Some(limit) => match timeout(limit, handle.wait()).await {
                Ok(res) => res,
                Err(_) => {
                    handle.kill();
                    let _ = handle.wait().await;
                    let err = CirunError::Timeout {
                        command: handle.spec().to_string(),
                        elapsed: started_at.elapsed(),
                    };
                    report_failure(options, handle, &err.to_string());
                    results.push(SuiteResult {
                        label: label.clone(),
                        exit_code: WATCHDOG_EXIT_CODE,
                    });
                    return RunOutcome::failure(WATCHDOG_EXIT_CODE, results, &label);
                }
            },
            None => handle.wait().await,
        };

        let code = waited.unwrap_or_else(|e| {
            warn!(label = %label, error = %e, "wait failed");
            FAILURE_EXIT_CODE
        });
        results.push(SuiteResult {
            label: label.clone(),
            exit_code: code,
        });

        if code != 0 {
            let err = CirunError::Runtime {
                command: handle.spec().to_string(),
                code,
            };
            report_failure(options, handle, &err.to_string());
            return RunOutcome::failure(code, results, &label);
        }
        info!(label = %label, elapsed = ?started_at.elapsed(), "finished");
    }

    RunOutcome::success(results)
}
