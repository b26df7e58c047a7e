// src/orchestrator/mod.rs

//! Test orchestration: turn a request into a fixed, deterministic plan.
//!
//! - [`categories`] classifies the requested flags.
//! - [`suite`] names the suites and their commands.
//! - [`plan`] holds the decision table and the resulting [`ExecutionPlan`].

pub mod categories;
pub mod plan;
pub mod suite;

pub use categories::{TestCategories, TestFlags};
pub use plan::{ExecutionPlan, PlanEntry, select_plan, select_suites};
pub use suite::{SuiteCommands, SuiteSpec, TestSuite};

/// Classifies requests and builds plans from a fixed command table.
#[derive(Debug, Clone, Default)]
pub struct TestOrchestrator {
    commands: SuiteCommands,
}

impl TestOrchestrator {
    pub fn new(commands: SuiteCommands) -> Self {
        Self { commands }
    }

    /// Classify `flags` and select the plan. A fresh plan every call.
    pub fn plan(&self, flags: &TestFlags) -> (TestCategories, ExecutionPlan) {
        let categories = TestCategories::from_flags(flags);
        let plan = select_plan(&categories, flags.source_changed, &self.commands);
        (categories, plan)
    }
}
