// src/orchestrator/plan.rs

//! Execution plans and the decision table that selects them.

use std::time::Duration;

use crate::process::{CommandSpec, ProcessHandle, ProcessOptions};
use crate::types::ConcurrencyMode;

use super::categories::TestCategories;
use super::suite::{SuiteCommands, TestSuite};

/// One plan entry: a factory for a not-yet-started process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub suite: TestSuite,
    pub command: CommandSpec,
    pub timeout: Option<Duration>,
}

impl PlanEntry {
    /// Build the handle for this entry. The caller decides when to start it.
    pub fn create_handle(&self, options: ProcessOptions) -> ProcessHandle {
        ProcessHandle::new(self.command.clone(), options)
    }
}

/// What to run for one invocation, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub entries: Vec<PlanEntry>,
    pub mode: ConcurrencyMode,
    pub max_workers: usize,
}

impl ExecutionPlan {
    pub fn suites(&self) -> Vec<TestSuite> {
        self.entries.iter().map(|e| e.suite).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The decision table: which suites, in which order, in which mode.
///
/// Pure function of its inputs.
pub fn select_suites(
    categories: &TestCategories,
    source_changed: bool,
) -> (Vec<TestSuite>, ConcurrencyMode) {
    use ConcurrencyMode::{Parallel, Sequential};
    use TestSuite::*;

    let c = categories;
    if c.integration_only {
        return (vec![Integration], Sequential);
    }
    if c.unit_only {
        return (vec![NamespaceCheck, Unit], Sequential);
    }
    if c.examples_only {
        return (vec![NamespaceCheck, Examples], Sequential);
    }
    if c.py_only {
        return (vec![PythonTests], Sequential);
    }

    match (c.unit, c.examples, c.py, c.integration) {
        (true, true, false, false) => (vec![NamespaceCheck, Unit, Examples], Parallel),
        (true, false, true, false) => (vec![NamespaceCheck, Unit, PythonTests], Parallel),
        (false, true, true, false) => (vec![NamespaceCheck, Examples, PythonTests], Parallel),
        _ => {
            let mut suites = vec![NamespaceCheck];
            if c.unit {
                suites.push(Unit);
            }
            if c.examples {
                suites.push(Examples);
            }
            if c.py {
                suites.push(PythonTests);
            }
            if c.integration {
                suites.push(Integration);
            }
            if source_changed {
                suites.push(UnoCompileCheck);
            }
            (suites, Parallel)
        }
    }
}

/// Build the full plan, resolving each suite to its configured command.
pub fn select_plan(
    categories: &TestCategories,
    source_changed: bool,
    commands: &SuiteCommands,
) -> ExecutionPlan {
    let (suites, mode) = select_suites(categories, source_changed);
    let entries: Vec<PlanEntry> = suites
        .into_iter()
        .map(|suite| {
            let spec = commands.get(suite);
            PlanEntry {
                suite,
                command: spec.command,
                timeout: spec.timeout,
            }
        })
        .collect();
    let max_workers = match mode {
        ConcurrencyMode::Sequential => 1,
        ConcurrencyMode::Parallel => entries.len().max(1),
    };
    ExecutionPlan {
        entries,
        mode,
        max_workers,
    }
}
