use std::error::Error;
use std::path::Path;
use std::time::{Duration, Instant};

use cirun::orchestrator::{TestFlags, TestOrchestrator};
use cirun::runloop::{RunLoopOptions, run_parallel, run_plan, run_sequential};
use cirun::types::{ConcurrencyMode, WATCHDOG_EXIT_CODE};
use cirun_test_utils::builders::{
    ConfigFileBuilder, capture_run_options, fail_after, planned, sh, sleeper, succeed,
};
use cirun_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

/// A command that creates `marker` after `delay_s` seconds, if it is still alive.
fn touch_later(label: &str, marker: &Path, delay_s: f64) -> cirun::process::CommandSpec {
    sh(label, &format!("sleep {delay_s}; touch '{}'", marker.display()))
}

#[tokio::test]
async fn sequential_runs_everything_in_order() -> TestResult {
    init_tracing();
    let (options, sink) = capture_run_options(false);
    let processes = vec![
        planned(sh("a", "echo from-a"), true, sink.clone()),
        planned(sh("b", "echo from-b"), true, sink.clone()),
    ];

    let outcome = with_timeout(run_sequential(processes, &options)).await;

    assert!(outcome.is_success());
    let labels: Vec<&str> = outcome.results.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["a", "b"]);
    assert_eq!(sink.lines_for("a"), vec!["from-a"]);
    assert_eq!(sink.lines_for("b"), vec!["from-b"]);
    Ok(())
}

#[tokio::test]
async fn sequential_stops_at_first_failure() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("later-ran");
    let (options, sink) = capture_run_options(false);
    let processes = vec![
        planned(succeed("first"), true, sink.clone()),
        planned(sh("broken", "exit 3"), true, sink.clone()),
        planned(touch_later("later", &marker, 0.0), true, sink.clone()),
    ];

    let outcome = with_timeout(run_sequential(processes, &options)).await;

    assert_eq!(outcome.exit_code, 3);
    assert_eq!(outcome.failed.as_deref(), Some("broken"));
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.code_for("broken"), Some(3));
    assert!(!marker.exists(), "a process after the failure was started");
    assert!(sink.contains("FAILED [broken]"));
    Ok(())
}

#[tokio::test]
async fn sequential_startup_failure_exits_one() -> TestResult {
    init_tracing();
    let (options, sink) = capture_run_options(false);
    let processes = vec![planned(
        cirun::process::CommandSpec::new("ghost", ["/definitely/not/here/cirun-ghost"]),
        true,
        sink.clone(),
    )];

    let outcome = with_timeout(run_sequential(processes, &options)).await;
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(outcome.failed.as_deref(), Some("ghost"));
    Ok(())
}

#[tokio::test]
async fn sequential_timeout_exits_with_watchdog_code() -> TestResult {
    init_tracing();
    let (options, sink) = capture_run_options(false);
    let processes =
        vec![planned(sleeper("stuck"), true, sink.clone()).with_timeout(Duration::from_millis(300))];

    let started = Instant::now();
    let outcome = with_timeout(run_sequential(processes, &options)).await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(outcome.exit_code, WATCHDOG_EXIT_CODE);
    Ok(())
}

#[tokio::test]
async fn parallel_all_succeed() -> TestResult {
    init_tracing();
    let (options, sink) = capture_run_options(false);
    let processes = vec![
        planned(sh("p1", "sleep 0.1; echo one"), false, sink.clone()),
        planned(sh("p2", "echo two"), false, sink.clone()),
        planned(succeed("p3"), false, sink.clone()),
    ];

    let outcome = with_timeout(run_parallel(processes, &options)).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.results.len(), 3);
    for label in ["p1", "p2", "p3"] {
        assert_eq!(outcome.code_for(label), Some(0));
    }
    Ok(())
}

#[tokio::test]
async fn parallel_failure_kills_siblings() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let m1 = dir.path().join("s1");
    let m2 = dir.path().join("s2");
    let (options, sink) = capture_run_options(false);
    let processes = vec![
        planned(touch_later("s1", &m1, 1.0), false, sink.clone()),
        planned(fail_after("bad", 4, Duration::from_millis(200)), false, sink.clone()),
        planned(touch_later("s2", &m2, 1.0), false, sink.clone()),
    ];

    let started = Instant::now();
    let outcome = with_timeout(run_parallel(processes, &options)).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(outcome.exit_code, 4);
    assert_eq!(outcome.failed.as_deref(), Some("bad"));
    assert!(sink.contains("FAILED [bad]"));

    // Had the siblings survived, they would have written their markers by now.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!m1.exists());
    assert!(!m2.exists());
    Ok(())
}

#[tokio::test]
async fn parallel_timeout_kills_everything() -> TestResult {
    init_tracing();
    let (options, sink) = capture_run_options(false);
    let processes = vec![
        planned(sleeper("stuck"), false, sink.clone()).with_timeout(Duration::from_millis(300)),
        planned(sleeper("bystander"), false, sink.clone()),
    ];

    let started = Instant::now();
    let outcome = with_timeout(run_parallel(processes, &options)).await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(outcome.exit_code, WATCHDOG_EXIT_CODE);
    assert_eq!(outcome.failed.as_deref(), Some("stuck"));
    Ok(())
}

#[tokio::test]
async fn parallel_prints_only_important_lines_unless_verbose() -> TestResult {
    init_tracing();
    let script = "echo compiling foo.cpp; echo 'Running test: test_rgb'; echo 'Test passed'; echo linking";

    let (quiet, quiet_sink) = capture_run_options(false);
    let outcome = with_timeout(run_parallel(
        vec![planned(sh("t", script), false, quiet_sink.clone())],
        &quiet,
    ))
    .await;
    assert!(outcome.is_success());
    assert_eq!(
        quiet_sink.lines_for("t"),
        vec!["Running test: test_rgb", "Test passed"]
    );

    let (loud, loud_sink) = capture_run_options(true);
    with_timeout(run_parallel(
        vec![planned(sh("t", script), false, loud_sink.clone())],
        &loud,
    ))
    .await;
    assert_eq!(loud_sink.lines_for("t").len(), 4);
    Ok(())
}

#[tokio::test]
async fn extra_markers_widen_the_filter() -> TestResult {
    init_tracing();
    let cfg = ConfigFileBuilder::new().with_extra_marker("^warning:").build();
    let (mut options, sink) = capture_run_options(false);
    options.filter = cfg.output.filter.clone();

    let outcome = with_timeout(run_parallel(
        vec![planned(sh("w", "echo 'warning: unused'; echo quiet"), false, sink.clone())],
        &options,
    ))
    .await;

    assert!(outcome.is_success());
    assert_eq!(sink.lines_for("w"), vec!["warning: unused"]);
    Ok(())
}

#[tokio::test]
async fn both_loops_agree_when_everything_passes() -> TestResult {
    init_tracing();
    let scripts = [
        ("p1", "echo one"),
        ("p2", "sleep 0.1; echo two 1>&2"),
        ("p3", "exit 0"),
        ("p4", "printf 'no newline'"),
    ];

    let (seq_opts, seq_sink) = capture_run_options(false);
    let seq = with_timeout(run_sequential(
        scripts
            .iter()
            .map(|(l, s)| planned(sh(l, s), true, seq_sink.clone()))
            .collect(),
        &seq_opts,
    ))
    .await;

    let (par_opts, par_sink) = capture_run_options(false);
    let par = with_timeout(run_parallel(
        scripts
            .iter()
            .map(|(l, s)| planned(sh(l, s), false, par_sink.clone()))
            .collect(),
        &par_opts,
    ))
    .await;

    assert!(seq.is_success(), "{seq:?}");
    assert!(par.is_success(), "{par:?}");
    assert_eq!(seq.exit_code, par.exit_code);
    assert_eq!(seq.results.len(), scripts.len());
    assert_eq!(par.results.len(), scripts.len());
    for (label, _) in scripts {
        assert_eq!(seq.code_for(label), Some(0), "{label}");
        assert_eq!(seq.code_for(label), par.code_for(label), "{label}");
    }
    Ok(())
}

#[tokio::test]
async fn both_loops_agree_on_the_exit_code() -> TestResult {
    init_tracing();
    let scripts = [("x", "exit 0"), ("y", "sleep 0.1; exit 6"), ("z", "exit 0")];

    let (seq_opts, seq_sink) = capture_run_options(false);
    let seq = with_timeout(run_sequential(
        scripts
            .iter()
            .map(|(l, s)| planned(sh(l, s), true, seq_sink.clone()))
            .collect(),
        &seq_opts,
    ))
    .await;

    let (par_opts, par_sink) = capture_run_options(false);
    let par = with_timeout(run_parallel(
        scripts
            .iter()
            .map(|(l, s)| planned(sh(l, s), false, par_sink.clone()))
            .collect(),
        &par_opts,
    ))
    .await;

    assert_eq!(seq.exit_code, 6);
    assert_eq!(par.exit_code, 6);
    assert_eq!(seq.failed, par.failed);
    Ok(())
}

fn stub_suites() -> ConfigFileBuilder {
    ConfigFileBuilder::new()
        .with_suite("namespace-check", "echo namespace ok")
        .with_suite("unit", "echo 'Running test: unit'")
        .with_suite("examples", "echo examples ok")
        .with_suite("python-tests", "echo 'Test passed'")
        .with_suite("integration", "echo integration ok")
        .with_suite("uno-compile-check", "echo uno ok")
}

#[tokio::test]
async fn orchestrated_unit_only_plan_runs_sequentially() -> TestResult {
    init_tracing();
    let cfg = stub_suites().build();
    let orchestrator = TestOrchestrator::new(cfg.suites.clone());
    let (_, plan) = orchestrator.plan(&TestFlags {
        unit: true,
        ..TestFlags::default()
    });
    assert_eq!(plan.mode, ConcurrencyMode::Sequential);

    let (options, sink) = capture_run_options(false);
    let outcome = with_timeout(run_plan(&plan, &options)).await;

    assert!(outcome.is_success());
    let labels: Vec<&str> = outcome.results.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["namespace-check", "unit"]);
    // Sequential plans echo everything.
    assert_eq!(sink.lines_for("namespace-check"), vec!["namespace ok"]);
    Ok(())
}

#[tokio::test]
async fn orchestrated_full_plan_runs_in_parallel() -> TestResult {
    init_tracing();
    let cfg = stub_suites().build();
    let orchestrator = TestOrchestrator::new(cfg.suites.clone());
    let (_, plan) = orchestrator.plan(&TestFlags {
        source_changed: true,
        ..TestFlags::default()
    });
    assert_eq!(plan.mode, ConcurrencyMode::Parallel);

    let options = RunLoopOptions {
        sink: capture_run_options(false).1,
        ..RunLoopOptions::default()
    };
    let outcome = with_timeout(run_plan(&plan, &options)).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.results.len(), 6);
    Ok(())
}

#[tokio::test]
async fn orchestrated_parallel_failure_propagates() -> TestResult {
    init_tracing();
    let cfg = stub_suites()
        .with_suite("examples", "echo 'ERROR: example broke'; exit 9")
        .build();
    let orchestrator = TestOrchestrator::new(cfg.suites.clone());
    let (_, plan) = orchestrator.plan(&TestFlags {
        unit: true,
        examples: true,
        ..TestFlags::default()
    });

    let (options, sink) = capture_run_options(false);
    let outcome = with_timeout(run_plan(&plan, &options)).await;

    assert_eq!(outcome.exit_code, 9);
    assert_eq!(outcome.failed.as_deref(), Some("examples"));
    assert!(sink.contains("ERROR: example broke"));
    Ok(())
}
