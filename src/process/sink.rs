// src/process/sink.rs

//! Line sinks: where echoed process output and run-loop output end up.
//!
//! Production code writes to the console; tests swap in a [`CaptureSink`]
//! so they can assert on exactly what would have been printed.

use std::fmt::Debug;
use std::io::Write;
use std::sync::{Mutex, MutexGuard};

/// Destination for whole lines of output.
pub trait LineSink: Send + Sync + Debug {
    /// Write one line produced by the command labelled `label`.
    fn write_line(&self, label: &str, line: &str);
}

/// Writes lines to stdout, optionally prefixed with the command label.
#[derive(Debug, Clone, Default)]
pub struct ConsoleSink {
    prefix_labels: bool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix each line with `[label]`, useful when several commands share
    /// the terminal.
    pub fn with_labels() -> Self {
        Self {
            prefix_labels: true,
        }
    }
}

impl LineSink for ConsoleSink {
    fn write_line(&self, label: &str, line: &str) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        // A closed stdout (e.g. `| head`) must not take the supervisor down.
        let _ = if self.prefix_labels {
            writeln!(out, "[{label}] {line}")
        } else {
            writeln!(out, "{line}")
        };
    }
}

/// One captured line together with the label of the command that wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLine {
    pub label: String,
    pub line: String,
}

/// In-memory sink that records every line it receives.
#[derive(Debug, Default)]
pub struct CaptureSink {
    lines: Mutex<Vec<CapturedLine>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything captured so far, in arrival order.
    pub fn lines(&self) -> Vec<CapturedLine> {
        self.guard().clone()
    }

    /// Only the text of lines written by `label`, in arrival order.
    pub fn lines_for(&self, label: &str) -> Vec<String> {
        self.guard()
            .iter()
            .filter(|l| l.label == label)
            .map(|l| l.line.clone())
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.guard().iter().any(|l| l.line.contains(needle))
    }

    fn guard(&self) -> MutexGuard<'_, Vec<CapturedLine>> {
        // A panicking writer cannot leave a Vec half-pushed; keep going.
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LineSink for CaptureSink {
    fn write_line(&self, label: &str, line: &str) {
        self.guard().push(CapturedLine {
            label: label.to_string(),
            line: line.to_string(),
        });
    }
}
