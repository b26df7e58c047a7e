// src/boards.rs

//! Per-board build fan-out.
//!
//! One [`ProcessWorkItem`] per board, driven directly by the [`Executor`]
//! (no test plan involved). Compilation is CPU bound, so the default policy
//! caps workers at the CPU count.

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::config::CommandValue;
use crate::executor::{Executor, ExecutorConfig, ProcessWorkItem, RunReport, WorkItem};
use crate::process::{CommandSpec, ProcessOptions};

/// Replaced by the board name in build command templates.
pub const BOARD_PLACEHOLDER: &str = "{board}";

/// How to build one board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTemplate {
    /// Must mention [`BOARD_PLACEHOLDER`].
    pub command: CommandValue,
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl Default for BuildTemplate {
    fn default() -> Self {
        Self {
            command: CommandValue::Argv(
                ["uv", "run", "ci/ci-compile.py", BOARD_PLACEHOLDER, "--no-interactive"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
            cwd: None,
            timeout: None,
        }
    }
}

impl BuildTemplate {
    /// The command that builds `board`, labelled with the board name.
    pub fn for_board(&self, board: &str) -> CommandSpec {
        let spec = self.command.substitute(BOARD_PLACEHOLDER, board).to_spec(board);
        match &self.cwd {
            Some(cwd) => spec.with_cwd(cwd),
            None => spec,
        }
    }
}

/// One work item per board. Duplicate board names are built once.
pub fn board_items(
    boards: &[String],
    template: &BuildTemplate,
    options: &ProcessOptions,
) -> Vec<Box<dyn WorkItem>> {
    let mut seen = std::collections::BTreeSet::new();
    boards
        .iter()
        .filter(|b| seen.insert(b.as_str()))
        .map(|board| {
            let mut item = ProcessWorkItem::new(template.for_board(board)).with_options(options.clone());
            if let Some(t) = template.timeout {
                item = item.timeout(t);
            }
            Box::new(item) as Box<dyn WorkItem>
        })
        .collect()
}

/// Build every board, cancelling the rest on the first failure.
pub async fn build_boards(
    boards: &[String],
    template: &BuildTemplate,
    config: ExecutorConfig,
    options: &ProcessOptions,
) -> RunReport {
    let items = board_items(boards, template, options);
    info!(boards = items.len(), "building boards");
    Executor::new(config).run_all(items).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_substituted_in_every_argument() {
        let template = BuildTemplate {
            command: CommandValue::Argv(vec![
                "make".to_string(),
                "BOARD={board}".to_string(),
                "out/{board}".to_string(),
            ]),
            cwd: Some(PathBuf::from("/tmp")),
            timeout: None,
        };
        let spec = template.for_board("esp32dev");
        assert_eq!(spec.label, "esp32dev");
        assert_eq!(spec.argv, vec!["make", "BOARD=esp32dev", "out/esp32dev"]);
        assert_eq!(spec.cwd, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn shell_template_becomes_single_shell_argument() {
        let template = BuildTemplate {
            command: CommandValue::Shell("pio run -e {board}".to_string()),
            cwd: None,
            timeout: None,
        };
        let spec = template.for_board("uno");
        assert_eq!(spec.argv.last().map(String::as_str), Some("pio run -e uno"));
    }

    #[test]
    fn duplicate_boards_are_built_once() {
        let boards: Vec<String> = ["uno", "esp32", "uno"].iter().map(|s| s.to_string()).collect();
        let items = board_items(&boards, &BuildTemplate::default(), &ProcessOptions::default());
        let names: Vec<&str> = items.iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["uno", "esp32"]);
    }
}
