// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::boards::BuildTemplate;
use crate::orchestrator::SuiteCommands;
use crate::process::CommandSpec;
use crate::runloop::ImportanceFilter;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [executor]
/// max_workers = 4
/// reader_join_grace = "2s"
///
/// [output]
/// verbose = false
/// poll_interval = "10ms"
/// extra_markers = ["^warning:"]
///
/// [suite.unit]
/// cmd = "uv run ci/cpp_test_run.py"
/// timeout = "20m"
///
/// [build]
/// cmd = ["uv", "run", "ci/ci-compile.py", "{board}"]
/// timeout = "15m"
/// ```
///
/// Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub output: OutputSection,

    /// `[suite.<name>]` overrides, keyed by suite name (`unit`,
    /// `python-tests`, ...).
    #[serde(default)]
    pub suite: BTreeMap<String, SuiteSection>,

    #[serde(default)]
    pub build: Option<BuildSection>,
}

/// `[executor]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorSection {
    /// Override the worker policy with a fixed count.
    #[serde(default)]
    pub max_workers: Option<usize>,

    /// Grace period for joining a process's output reader, e.g. `"2s"`.
    #[serde(default)]
    pub reader_join_grace: Option<String>,

    /// Default per-item bound for fan-out work, e.g. `"30m"`.
    #[serde(default)]
    pub item_timeout: Option<String>,
}

/// `[output]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    #[serde(default)]
    pub verbose: bool,

    /// How long the parallel loop waits on each handle per visit.
    #[serde(default)]
    pub poll_interval: Option<String>,

    /// Regexes that make a line important, on top of the fixed markers.
    #[serde(default)]
    pub extra_markers: Vec<String>,
}

/// A command either as one shell string or as an argument vector.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandValue {
    Shell(String),
    Argv(Vec<String>),
}

impl CommandValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CommandValue::Shell(s) => s.trim().is_empty(),
            CommandValue::Argv(v) => v.is_empty() || v[0].trim().is_empty(),
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        match self {
            CommandValue::Shell(s) => s.contains(needle),
            CommandValue::Argv(v) => v.iter().any(|a| a.contains(needle)),
        }
    }

    /// Replace every occurrence of `placeholder` with `value`.
    pub fn substitute(&self, placeholder: &str, value: &str) -> CommandValue {
        match self {
            CommandValue::Shell(s) => CommandValue::Shell(s.replace(placeholder, value)),
            CommandValue::Argv(v) => {
                CommandValue::Argv(v.iter().map(|a| a.replace(placeholder, value)).collect())
            }
        }
    }

    pub fn to_spec(&self, label: &str) -> CommandSpec {
        match self {
            CommandValue::Shell(s) => CommandSpec::shell(label, s),
            CommandValue::Argv(v) => CommandSpec::new(label, v.iter().cloned()),
        }
    }
}

/// `[suite.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteSection {
    pub cmd: CommandValue,

    #[serde(default)]
    pub cwd: Option<PathBuf>,

    #[serde(default)]
    pub timeout: Option<String>,
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Must contain `{board}`.
    pub cmd: CommandValue,

    #[serde(default)]
    pub cwd: Option<PathBuf>,

    #[serde(default)]
    pub timeout: Option<String>,
}

/// Validated executor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub max_workers: Option<usize>,
    pub reader_join_grace: Duration,
    pub item_timeout: Option<Duration>,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_workers: None,
            reader_join_grace: Duration::from_secs(2),
            item_timeout: None,
        }
    }
}

/// Validated output settings.
#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub verbose: bool,
    pub poll_interval: Duration,
    pub filter: ImportanceFilter,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            verbose: false,
            poll_interval: Duration::from_millis(10),
            filter: ImportanceFilter::default(),
        }
    }
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`) or
/// `Default`.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub executor: ExecutorSettings,
    pub output: OutputSettings,
    pub suites: SuiteCommands,
    pub build: BuildTemplate,
}
