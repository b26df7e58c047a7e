// src/orchestrator/categories.rs

//! Classification of a requested test run.

/// Raw request, as given on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TestFlags {
    pub unit: bool,
    pub examples: bool,
    pub py: bool,
    pub integration: bool,
    /// Library sources changed since the last run; adds the uno compile check
    /// to mixed runs.
    pub source_changed: bool,
}

impl TestFlags {
    fn requested(&self) -> usize {
        [self.unit, self.examples, self.py, self.integration]
            .iter()
            .filter(|b| **b)
            .count()
    }
}

/// Categories a run covers, plus the derived `_only` flags.
///
/// At most one `_only` flag is ever set, and only when exactly one primary
/// category is requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TestCategories {
    pub unit: bool,
    pub examples: bool,
    pub py: bool,
    pub integration: bool,
    pub unit_only: bool,
    pub examples_only: bool,
    pub py_only: bool,
    pub integration_only: bool,
}

impl TestCategories {
    /// Classify `flags`. Requesting nothing means requesting everything.
    pub fn from_flags(flags: &TestFlags) -> Self {
        let (unit, examples, py, integration) = if flags.requested() == 0 {
            (true, true, true, true)
        } else {
            (flags.unit, flags.examples, flags.py, flags.integration)
        };

        let single = flags.requested() == 1;
        Self {
            unit,
            examples,
            py,
            integration,
            unit_only: single && unit,
            examples_only: single && examples,
            py_only: single && py,
            integration_only: single && integration,
        }
    }

    pub fn primary_count(&self) -> usize {
        [self.unit, self.examples, self.py, self.integration]
            .iter()
            .filter(|b| **b)
            .count()
    }

    pub fn only_count(&self) -> usize {
        [
            self.unit_only,
            self.examples_only,
            self.py_only,
            self.integration_only,
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }
}
