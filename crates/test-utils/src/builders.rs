#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use cirun::config::{BuildSection, CommandValue, ConfigFile, RawConfigFile, SuiteSection};
use cirun::process::{CaptureSink, CommandSpec, ProcessHandle, ProcessOptions};
use cirun::runloop::{ImportanceFilter, PlannedProcess, RunLoopOptions};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                suite: BTreeMap::new(),
                ..RawConfigFile::default()
            },
        }
    }

    /// Override a suite with a shell command.
    pub fn with_suite(mut self, name: &str, cmd: &str) -> Self {
        self.config.suite.insert(
            name.to_string(),
            SuiteSection {
                cmd: CommandValue::Shell(cmd.to_string()),
                cwd: None,
                timeout: None,
            },
        );
        self
    }

    pub fn with_suite_timeout(mut self, name: &str, cmd: &str, timeout: &str) -> Self {
        self.config.suite.insert(
            name.to_string(),
            SuiteSection {
                cmd: CommandValue::Shell(cmd.to_string()),
                cwd: None,
                timeout: Some(timeout.to_string()),
            },
        );
        self
    }

    pub fn with_build(mut self, cmd: &str) -> Self {
        self.config.build = Some(BuildSection {
            cmd: CommandValue::Shell(cmd.to_string()),
            cwd: None,
            timeout: None,
        });
        self
    }

    pub fn with_max_workers(mut self, n: usize) -> Self {
        self.config.executor.max_workers = Some(n);
        self
    }

    pub fn with_extra_marker(mut self, pattern: &str) -> Self {
        self.config.output.extra_markers.push(pattern.to_string());
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A `sh -c` command labelled `label`.
pub fn sh(label: &str, script: &str) -> CommandSpec {
    CommandSpec::shell(label, script)
}

/// Exits 0 straight away.
pub fn succeed(label: &str) -> CommandSpec {
    sh(label, "exit 0")
}

/// Exits with `code` after an optional delay.
pub fn fail_after(label: &str, code: i32, delay: Duration) -> CommandSpec {
    sh(label, &format!("sleep {:.2}; exit {code}", delay.as_secs_f64()))
}

/// Sleeps far longer than any test should take; only ever ends by being killed.
pub fn sleeper(label: &str) -> CommandSpec {
    sh(label, "sleep 30")
}

/// Handle options that capture echoed output instead of printing it.
pub fn capture_options() -> (ProcessOptions, Arc<CaptureSink>) {
    let sink = Arc::new(CaptureSink::new());
    let options = ProcessOptions {
        echo: true,
        sink: sink.clone(),
        reader_join_grace: Duration::from_secs(2),
        registry: None,
    };
    (options, sink)
}

/// Run-loop options writing into a fresh [`CaptureSink`].
pub fn capture_run_options(verbose: bool) -> (RunLoopOptions, Arc<CaptureSink>) {
    let sink = Arc::new(CaptureSink::new());
    let options = RunLoopOptions {
        verbose,
        poll_interval: Duration::from_millis(10),
        sink: sink.clone(),
        filter: ImportanceFilter::default(),
        reader_join_grace: Duration::from_secs(2),
        registry: None,
    };
    (options, sink)
}

/// A not-yet-started process for the run loops, echoing into `sink` when
/// `echo` is set.
pub fn planned(spec: CommandSpec, echo: bool, sink: Arc<CaptureSink>) -> PlannedProcess {
    PlannedProcess::new(ProcessHandle::new(
        spec,
        ProcessOptions {
            echo,
            sink,
            reader_join_grace: Duration::from_secs(2),
            registry: None,
        },
    ))
}
