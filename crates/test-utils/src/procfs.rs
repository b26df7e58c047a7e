//! Liveness checks read straight from `/proc`, independent of the runtime.

use std::time::{Duration, Instant};

/// State letter from `/proc/<pid>/stat` (`R`, `S`, `Z`, ...), or `None`
/// once the process has been reaped.
pub fn process_state(pid: u32) -> Option<char> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // The command name is parenthesised and may itself contain spaces.
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.trim_start().chars().next()
}

/// A zombie counts as dead: it only waits to be reaped.
pub fn is_alive(pid: u32) -> bool {
    matches!(process_state(pid), Some(state) if state != 'Z' && state != 'X')
}

/// Block the calling thread until `pid` is dead or `limit` passes.
///
/// Deliberately not async: the runtime gets no chance to run in between.
pub fn wait_until_dead(pid: u32, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while is_alive(pid) {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    true
}
