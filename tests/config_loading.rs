use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use cirun::config::{CommandValue, default_config_path, load_and_validate, load_or_default};
use cirun::errors::CirunError;
use cirun::orchestrator::TestSuite;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> Result<(TempDir, PathBuf), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Cirun.toml");
    fs::write(&path, contents)?;
    Ok((dir, path))
}

#[test]
fn full_config_is_resolved() -> TestResult {
    let (_dir, path) = write_config(
        r#"
[executor]
max_workers = 3
reader_join_grace = "500ms"
item_timeout = "10m"

[output]
verbose = true
poll_interval = "25ms"
extra_markers = ["^warning:"]

[suite.unit]
cmd = "make test"
cwd = "build"
timeout = "20m"

[suite.python-tests]
cmd = ["pytest", "-q"]

[build]
cmd = ["pio", "run", "-e", "{board}"]
timeout = "15m"
"#,
    )?;

    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.executor.max_workers, Some(3));
    assert_eq!(cfg.executor.reader_join_grace, Duration::from_millis(500));
    assert_eq!(cfg.executor.item_timeout, Some(Duration::from_secs(600)));

    assert!(cfg.output.verbose);
    assert_eq!(cfg.output.poll_interval, Duration::from_millis(25));
    assert!(cfg.output.filter.is_important("warning: shadowed"));

    let unit = cfg.suites.get(TestSuite::Unit);
    assert_eq!(unit.command.label, "unit");
    assert_eq!(unit.command.argv.last().map(String::as_str), Some("make test"));
    assert_eq!(unit.command.cwd, Some(PathBuf::from("build")));
    assert_eq!(unit.timeout, Some(Duration::from_secs(1200)));

    let py = cfg.suites.get(TestSuite::PythonTests);
    assert_eq!(py.command.argv, vec!["pytest", "-q"]);

    // Untouched suites keep their built-in command.
    assert_eq!(cfg.suites.get(TestSuite::Examples).command.program(), Some("uv"));

    let esp = cfg.build.for_board("esp32dev");
    assert_eq!(esp.argv, vec!["pio", "run", "-e", "esp32dev"]);
    assert_eq!(cfg.build.timeout, Some(Duration::from_secs(900)));
    Ok(())
}

#[test]
fn missing_file_means_defaults() -> TestResult {
    let dir = tempfile::tempdir()?;
    let cfg = load_or_default(dir.path().join("nope.toml"))?;

    assert_eq!(cfg.executor.max_workers, None);
    assert_eq!(cfg.output.poll_interval, Duration::from_millis(10));
    assert!(matches!(cfg.build.command, CommandValue::Argv(_)));
    assert_eq!(default_config_path(), PathBuf::from("Cirun.toml"));
    Ok(())
}

#[test]
fn missing_file_is_an_error_when_required() {
    let err = load_and_validate("/definitely/not/here/Cirun.toml").expect_err("no file");
    assert!(matches!(err, CirunError::Io(_)));
}

#[test]
fn empty_file_is_valid() -> TestResult {
    let (_dir, path) = write_config("")?;
    let cfg = load_and_validate(&path)?;
    assert!(!cfg.output.verbose);
    Ok(())
}

fn config_error(contents: &str) -> String {
    let (_dir, path) = write_config(contents).expect("write config");
    match load_and_validate(&path) {
        Err(CirunError::Config(msg)) => msg,
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn unknown_suite_is_rejected() {
    let msg = config_error("[suite.fuzz]\ncmd = \"cargo fuzz\"\n");
    assert!(msg.contains("fuzz"), "{msg}");
}

#[test]
fn build_command_needs_the_board_placeholder() {
    let msg = config_error("[build]\ncmd = \"pio run\"\n");
    assert!(msg.contains("{board}"), "{msg}");
}

#[test]
fn empty_commands_are_rejected() {
    config_error("[suite.unit]\ncmd = \"  \"\n");
    config_error("[suite.unit]\ncmd = []\n");
}

#[test]
fn zero_workers_is_rejected() {
    let msg = config_error("[executor]\nmax_workers = 0\n");
    assert!(msg.contains("max_workers"), "{msg}");
}

#[test]
fn bad_durations_are_rejected() {
    let msg = config_error("[suite.unit]\ncmd = \"x\"\ntimeout = \"soon\"\n");
    assert!(msg.contains("suite.unit"), "{msg}");
    config_error("[output]\npoll_interval = \"0ms\"\n");
}

#[test]
fn invalid_marker_regex_is_rejected() {
    let msg = config_error("[output]\nextra_markers = [\"(unclosed\"]\n");
    assert!(msg.contains("marker"), "{msg}");
}

#[test]
fn unknown_keys_fail_to_parse() -> TestResult {
    let (_dir, path) = write_config("[executor]\nworkers = 2\n")?;
    let err = load_and_validate(&path).expect_err("typo must not be ignored");
    assert!(matches!(err, CirunError::Toml(_)), "got {err:?}");
    Ok(())
}
