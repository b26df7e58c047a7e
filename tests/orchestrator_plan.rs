use proptest::prelude::*;

use cirun::orchestrator::{TestCategories, TestFlags, TestOrchestrator, TestSuite};
use cirun::types::ConcurrencyMode;

fn flags_strategy() -> impl Strategy<Value = TestFlags> {
    (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(unit, examples, py, integration, source_changed)| TestFlags {
            unit,
            examples,
            py,
            integration,
            source_changed,
        },
    )
}

fn requested(flags: &TestFlags) -> usize {
    [flags.unit, flags.examples, flags.py, flags.integration]
        .iter()
        .filter(|b| **b)
        .count()
}

proptest! {
    #[test]
    fn same_request_same_plan(flags in flags_strategy()) {
        let orchestrator = TestOrchestrator::default();
        let first = orchestrator.plan(&flags);
        let second = orchestrator.plan(&flags);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn at_most_one_only_flag(flags in flags_strategy()) {
        let c = TestCategories::from_flags(&flags);
        prop_assert!(c.only_count() <= 1);
        prop_assert_eq!(c.only_count() == 1, requested(&flags) == 1);
    }

    #[test]
    fn plans_are_never_empty_and_never_repeat_a_suite(flags in flags_strategy()) {
        let (_, plan) = TestOrchestrator::default().plan(&flags);
        prop_assert!(!plan.is_empty());

        let mut suites = plan.suites();
        let total = suites.len();
        suites.sort();
        suites.dedup();
        prop_assert_eq!(suites.len(), total);
    }

    #[test]
    fn single_category_runs_sequentially(flags in flags_strategy()) {
        let (_, plan) = TestOrchestrator::default().plan(&flags);
        let expected = if requested(&flags) == 1 {
            ConcurrencyMode::Sequential
        } else {
            ConcurrencyMode::Parallel
        };
        prop_assert_eq!(plan.mode, expected);
        match plan.mode {
            ConcurrencyMode::Sequential => prop_assert_eq!(plan.max_workers, 1),
            ConcurrencyMode::Parallel => prop_assert_eq!(plan.max_workers, plan.entries.len()),
        }
    }

    #[test]
    fn uno_check_only_for_changed_sources_in_mixed_runs(flags in flags_strategy()) {
        let (_, plan) = TestOrchestrator::default().plan(&flags);
        if plan.suites().contains(&TestSuite::UnoCompileCheck) {
            prop_assert!(flags.source_changed);
            prop_assert_eq!(plan.mode, ConcurrencyMode::Parallel);
        }
    }

    #[test]
    fn parallel_plans_start_with_the_namespace_check(flags in flags_strategy()) {
        let (_, plan) = TestOrchestrator::default().plan(&flags);
        if plan.mode == ConcurrencyMode::Parallel {
            prop_assert_eq!(plan.suites()[0], TestSuite::NamespaceCheck);
        }
    }
}

#[test]
fn empty_request_runs_everything() {
    let (categories, plan) = TestOrchestrator::default().plan(&TestFlags::default());
    assert!(categories.unit && categories.examples && categories.py && categories.integration);
    assert_eq!(categories.only_count(), 0);
    assert_eq!(
        plan.suites(),
        vec![
            TestSuite::NamespaceCheck,
            TestSuite::Unit,
            TestSuite::Examples,
            TestSuite::PythonTests,
            TestSuite::Integration,
        ]
    );
    assert_eq!(plan.mode, ConcurrencyMode::Parallel);
}

#[test]
fn entries_carry_configured_commands() {
    let (_, plan) = TestOrchestrator::default().plan(&TestFlags {
        py: true,
        ..TestFlags::default()
    });
    assert_eq!(plan.suites(), vec![TestSuite::PythonTests]);
    let entry = &plan.entries[0];
    assert_eq!(entry.command.label, "python-tests");
    assert_eq!(entry.command.program(), Some("uv"));
}
