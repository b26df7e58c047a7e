// src/lib.rs

pub mod boards;
pub mod cli;
pub mod config;
pub mod errors;
pub mod executor;
pub mod logging;
pub mod orchestrator;
pub mod process;
pub mod runloop;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::{BuildArgs, CliArgs, Command, FanoutArgs, TestArgs};
use crate::config::{ConfigFile, load_or_default};
use crate::executor::{Executor, ExecutorConfig, ProcessWorkItem, RunReport, WorkItem};
use crate::orchestrator::{ExecutionPlan, TestCategories, TestFlags, TestOrchestrator};
use crate::process::{CommandSpec, ConsoleSink, LineSink, ProcessOptions, ProcessRegistry};
use crate::runloop::{RunLoopOptions, run_plan};
use crate::types::{ConcurrencyMode, INTERRUPTED_EXIT_CODE};

/// How long an interrupted run waits for killed processes to be reaped.
const INTERRUPT_REAP_GRACE: Duration = Duration::from_secs(5);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the selected subcommand (test plan, board builds, ad-hoc fan-out)
/// - Ctrl-C handling
///
/// Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = load_or_default(&args.config)?;
    let registry = ProcessRegistry::new();

    let work = async {
        match &args.command {
            Command::Test(t) => run_tests(&cfg, t, &registry).await,
            Command::Build(b) => Ok(run_build(&cfg, b, &registry).await),
            Command::Fanout(f) => Ok(run_fanout(&cfg, f, &registry).await),
        }
    };

    let finished = tokio::select! {
        res = work => Some(res),
        _ = interrupted() => None,
    };
    if let Some(res) = finished {
        return res;
    }

    // Executor workers are spawned tasks and may still hold handles, so
    // dropping `work` is not enough: kill through the registry and wait
    // for the reaps before the process exits.
    warn!(running = registry.len(), "interrupted; killing running commands");
    let killed = registry.kill_all_and_reap(INTERRUPT_REAP_GRACE).await;
    info!(killed, "interrupted run cleaned up");
    Ok(INTERRUPTED_EXIT_CODE)
}

/// Resolves on Ctrl-C. Never resolves if the listener cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

async fn run_tests(cfg: &ConfigFile, args: &TestArgs, registry: &ProcessRegistry) -> Result<i32> {
    let flags = TestFlags {
        unit: args.unit,
        examples: args.examples,
        py: args.py,
        integration: args.integration,
        source_changed: args.source_changed,
    };
    let orchestrator = TestOrchestrator::new(cfg.suites.clone());
    let (categories, plan) = orchestrator.plan(&flags);
    info!(mode = %plan.mode, suites = ?plan.suites(), "selected test plan");

    if args.dry_run {
        print_dry_run(&categories, &plan);
        return Ok(0);
    }

    let sink: Arc<dyn LineSink> = match plan.mode {
        ConcurrencyMode::Sequential => Arc::new(ConsoleSink::new()),
        ConcurrencyMode::Parallel => Arc::new(ConsoleSink::with_labels()),
    };
    let options = RunLoopOptions {
        verbose: args.verbose || cfg.output.verbose,
        poll_interval: cfg.output.poll_interval,
        sink,
        filter: cfg.output.filter.clone(),
        reader_join_grace: cfg.executor.reader_join_grace,
        registry: Some(registry.clone()),
    };

    let outcome = run_plan(&plan, &options).await;
    if outcome.is_success() {
        info!(suites = outcome.results.len(), "all test suites passed");
    } else {
        eprintln!(
            "cirun: {} failed (exit code {})",
            outcome.failed.as_deref().unwrap_or("test run"),
            outcome.exit_code
        );
    }
    Ok(outcome.exit_code)
}

async fn run_build(cfg: &ConfigFile, args: &BuildArgs, registry: &ProcessRegistry) -> i32 {
    let mut config = executor_config(ExecutorConfig::cpu_bound(), cfg, args.jobs);
    if args.keep_going {
        config = config.keep_going();
    }
    let options = item_options(cfg, args.verbose, registry);
    let report = boards::build_boards(&args.boards, &cfg.build, config, &options).await;
    print_report(&report);
    report.exit_code()
}

async fn run_fanout(cfg: &ConfigFile, args: &FanoutArgs, registry: &ProcessRegistry) -> i32 {
    let config = executor_config(ExecutorConfig::io_bound(), cfg, args.jobs);
    let options = item_options(cfg, true, registry);
    let items: Vec<Box<dyn WorkItem>> = args
        .commands
        .iter()
        .enumerate()
        .map(|(i, cmd)| {
            let spec = CommandSpec::shell(format!("cmd{}", i + 1), cmd);
            Box::new(
                ProcessWorkItem::new(spec)
                    .with_options(options.clone())
                    .check(!args.no_check),
            ) as Box<dyn WorkItem>
        })
        .collect();
    let report = Executor::new(config).run_all(items).await;
    print_report(&report);
    report.exit_code()
}

/// `--jobs` wins over `[executor] max_workers`, which wins over the policy.
fn executor_config(base: ExecutorConfig, cfg: &ConfigFile, jobs: Option<usize>) -> ExecutorConfig {
    let mut config = base;
    if let Some(n) = jobs.or(cfg.executor.max_workers) {
        config = config.with_max_workers(n);
    }
    if let Some(t) = cfg.executor.item_timeout {
        config = config.with_item_timeout(t);
    }
    config
}

fn item_options(cfg: &ConfigFile, echo: bool, registry: &ProcessRegistry) -> ProcessOptions {
    ProcessOptions {
        echo,
        sink: Arc::new(ConsoleSink::with_labels()),
        reader_join_grace: cfg.executor.reader_join_grace,
        registry: Some(registry.clone()),
    }
}

/// Summary printed after an executor run.
fn print_report(report: &RunReport) {
    for result in &report.results {
        debug!(
            item = %result.name,
            status = ?result.status,
            code = ?result.exit_code,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "item finished"
        );
    }
    match &report.first_error {
        None => info!(items = report.results.len(), "all items succeeded"),
        Some(err) => {
            eprintln!("cirun: {} failed", err.name);
            eprintln!("{}", err.message);
        }
    }
}

/// Simple dry-run output: print categories, mode and commands.
fn print_dry_run(categories: &TestCategories, plan: &ExecutionPlan) {
    println!("cirun dry-run");
    println!("  categories = {categories:?}");
    println!("  mode = {}", plan.mode);
    println!("  max_workers = {}", plan.max_workers);
    println!();

    println!("suites ({}):", plan.entries.len());
    for entry in &plan.entries {
        println!("  - {}", entry.suite);
        println!("      cmd: {}", entry.command);
        if let Some(ref cwd) = entry.command.cwd {
            println!("      cwd: {}", cwd.display());
        }
        if let Some(timeout) = entry.timeout {
            println!("      timeout: {timeout:?}");
        }
    }

    debug!("dry-run complete (no execution)");
}
