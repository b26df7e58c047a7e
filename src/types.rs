// src/types.rs

//! Small shared types: exit-code conventions and concurrency modes.

use std::fmt;

/// Successful run.
pub const SUCCESS_EXIT_CODE: i32 = 0;
/// Ordinary failure when no more specific code is available.
pub const FAILURE_EXIT_CODE: i32 = 1;
/// Reserved for work killed by a timeout watchdog.
pub const WATCHDOG_EXIT_CODE: i32 = 2;
/// Run interrupted by Ctrl-C.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// How the entries of a plan are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConcurrencyMode {
    /// One after the other; the first failure stops the run.
    Sequential,
    /// All at once with interleaved output; the first failure kills the rest.
    Parallel,
}

impl fmt::Display for ConcurrencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcurrencyMode::Sequential => f.write_str("sequential"),
            ConcurrencyMode::Parallel => f.write_str("parallel"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_mode_displays_lowercase() {
        assert_eq!(ConcurrencyMode::Parallel.to_string(), "parallel");
        assert_eq!(ConcurrencyMode::Sequential.to_string(), "sequential");
    }

    #[test]
    fn watchdog_code_is_distinct_from_ordinary_failure() {
        assert_ne!(WATCHDOG_EXIT_CODE, FAILURE_EXIT_CODE);
        assert_ne!(WATCHDOG_EXIT_CODE, SUCCESS_EXIT_CODE);
    }
}
