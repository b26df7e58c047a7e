// src/orchestrator/suite.rs

//! The fixed set of test suites and the commands that run them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::process::CommandSpec;

/// Every suite a plan can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TestSuite {
    NamespaceCheck,
    Unit,
    Examples,
    PythonTests,
    Integration,
    UnoCompileCheck,
}

impl TestSuite {
    pub const ALL: [TestSuite; 6] = [
        TestSuite::NamespaceCheck,
        TestSuite::Unit,
        TestSuite::Examples,
        TestSuite::PythonTests,
        TestSuite::Integration,
        TestSuite::UnoCompileCheck,
    ];

    /// Name used in config files and output labels.
    pub fn name(&self) -> &'static str {
        match self {
            TestSuite::NamespaceCheck => "namespace-check",
            TestSuite::Unit => "unit",
            TestSuite::Examples => "examples",
            TestSuite::PythonTests => "python-tests",
            TestSuite::Integration => "integration",
            TestSuite::UnoCompileCheck => "uno-compile-check",
        }
    }

    fn default_argv(&self) -> &'static [&'static str] {
        match self {
            TestSuite::NamespaceCheck => &[
                "uv",
                "run",
                "python",
                "ci/tests/no_using_namespace_fl_in_headers.py",
            ],
            TestSuite::Unit => &["uv", "run", "ci/cpp_test_run.py"],
            TestSuite::Examples => &["uv", "run", "ci/test_example_compilation.py"],
            TestSuite::PythonTests => &[
                "uv",
                "run",
                "pytest",
                "-s",
                "ci/tests",
                "-xvs",
                "--durations=0",
            ],
            TestSuite::Integration => &["uv", "run", "ci/test_integration.py"],
            TestSuite::UnoCompileCheck => &[
                "uv",
                "run",
                "ci/ci-compile.py",
                "uno",
                "--examples",
                "Blink",
                "--no-interactive",
            ],
        }
    }
}

impl fmt::Display for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TestSuite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        TestSuite::ALL
            .into_iter()
            .find(|suite| suite.name() == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = TestSuite::ALL.iter().map(|s| s.name()).collect();
                format!("unknown suite '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

/// How one suite is run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteSpec {
    pub command: CommandSpec,
    /// Watchdog bound enforced by the run loop.
    pub timeout: Option<Duration>,
}

/// Command table for every suite, built-in defaults overridable by config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteCommands {
    specs: BTreeMap<TestSuite, SuiteSpec>,
}

impl Default for SuiteCommands {
    fn default() -> Self {
        let specs = TestSuite::ALL
            .into_iter()
            .map(|suite| {
                let spec = SuiteSpec {
                    command: CommandSpec::new(suite.name(), suite.default_argv().iter().copied()),
                    timeout: None,
                };
                (suite, spec)
            })
            .collect();
        Self { specs }
    }
}

impl SuiteCommands {
    pub fn get(&self, suite: TestSuite) -> SuiteSpec {
        self.specs.get(&suite).cloned().unwrap_or_else(|| SuiteSpec {
            command: CommandSpec::new(suite.name(), suite.default_argv().iter().copied()),
            timeout: None,
        })
    }

    pub fn set(&mut self, suite: TestSuite, spec: SuiteSpec) {
        self.specs.insert(suite, spec);
    }
}
