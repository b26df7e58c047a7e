// src/config/validate.rs

use std::time::Duration;

use crate::boards::{BOARD_PLACEHOLDER, BuildTemplate};
use crate::config::duration::parse_duration;
use crate::config::model::{
    ConfigFile, ExecutorSection, ExecutorSettings, OutputSection, OutputSettings, RawConfigFile,
};
use crate::errors::{CirunError, Result};
use crate::orchestrator::{SuiteCommands, SuiteSpec, TestSuite};
use crate::runloop::ImportanceFilter;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = CirunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let executor = validate_executor(&raw.executor)?;
        let output = validate_output(&raw.output)?;
        let suites = validate_suites(&raw)?;
        let build = validate_build(&raw)?;
        Ok(ConfigFile {
            executor,
            output,
            suites,
            build,
        })
    }
}

fn duration_field(section: &str, field: &str, value: Option<&String>) -> Result<Option<Duration>> {
    value
        .map(|s| {
            parse_duration(s)
                .map_err(|e| CirunError::Config(format!("[{section}].{field}: {e}")))
        })
        .transpose()
}

fn validate_executor(section: &ExecutorSection) -> Result<ExecutorSettings> {
    if section.max_workers == Some(0) {
        return Err(CirunError::Config(
            "[executor].max_workers must be >= 1 (got 0)".to_string(),
        ));
    }

    let defaults = ExecutorSettings::default();
    Ok(ExecutorSettings {
        max_workers: section.max_workers,
        reader_join_grace: duration_field(
            "executor",
            "reader_join_grace",
            section.reader_join_grace.as_ref(),
        )?
        .unwrap_or(defaults.reader_join_grace),
        item_timeout: duration_field("executor", "item_timeout", section.item_timeout.as_ref())?,
    })
}

fn validate_output(section: &OutputSection) -> Result<OutputSettings> {
    let poll_interval = duration_field("output", "poll_interval", section.poll_interval.as_ref())?
        .unwrap_or(OutputSettings::default().poll_interval);
    if poll_interval.is_zero() {
        return Err(CirunError::Config(
            "[output].poll_interval must be greater than zero".to_string(),
        ));
    }

    Ok(OutputSettings {
        verbose: section.verbose,
        poll_interval,
        filter: ImportanceFilter::with_patterns(&section.extra_markers)?,
    })
}

fn validate_suites(cfg: &RawConfigFile) -> Result<SuiteCommands> {
    let mut commands = SuiteCommands::default();

    for (name, section) in cfg.suite.iter() {
        let suite: TestSuite = name.parse().map_err(CirunError::Config)?;
        if section.cmd.is_empty() {
            return Err(CirunError::Config(format!(
                "[suite.{name}].cmd must not be empty"
            )));
        }

        let mut command = section.cmd.to_spec(suite.name());
        if let Some(cwd) = &section.cwd {
            command = command.with_cwd(cwd);
        }
        let section_name = format!("suite.{name}");
        let timeout = duration_field(&section_name, "timeout", section.timeout.as_ref())?;
        commands.set(suite, SuiteSpec { command, timeout });
    }

    Ok(commands)
}

fn validate_build(cfg: &RawConfigFile) -> Result<BuildTemplate> {
    let Some(section) = &cfg.build else {
        return Ok(BuildTemplate::default());
    };

    if section.cmd.is_empty() {
        return Err(CirunError::Config("[build].cmd must not be empty".to_string()));
    }
    if !section.cmd.contains(BOARD_PLACEHOLDER) {
        return Err(CirunError::Config(format!(
            "[build].cmd must contain the {BOARD_PLACEHOLDER} placeholder"
        )));
    }

    Ok(BuildTemplate {
        command: section.cmd.clone(),
        cwd: section.cwd.clone(),
        timeout: duration_field("build", "timeout", section.timeout.as_ref())?,
    })
}
