//! Shared helpers for cirun's integration tests.
//!
//! - [`builders`]: config files, commands and run-loop options.
//! - [`recording`]: work items that report what the executor did to them.
//! - [`procfs`]: whether a pid is still alive, Linux only.

pub mod builders;
#[cfg(target_os = "linux")]
pub mod procfs;
pub mod recording;

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Route `tracing` output through the test harness.
///
/// Captured per test and only shown for failures (or with `--nocapture`).
/// Filter with `CIRUN_LOG` or `RUST_LOG`, e.g. `CIRUN_LOG=cirun=trace`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("CIRUN_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("cirun=debug,warn"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .try_init();
    });
}

/// Upper bound for any single test that spawns real processes.
pub const TEST_DEADLINE: Duration = Duration::from_secs(15);

/// Fail the test instead of hanging when a child is never reaped.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    match tokio::time::timeout(TEST_DEADLINE, f).await {
        Ok(value) => value,
        Err(_) => panic!("test exceeded {TEST_DEADLINE:?}; a child process was probably not reaped"),
    }
}
