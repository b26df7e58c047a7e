// src/process/command.rs

//! Command descriptions handed to [`ProcessHandle`](super::ProcessHandle).

use std::fmt;
use std::path::PathBuf;

/// A fully tokenized command plus where to run it.
///
/// The process layer only ever sees an argument vector. String-form commands
/// from config files or the CLI go through [`CommandSpec::shell`], which
/// hands the string to the platform shell as a single argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Human-readable identity (suite name, board name, ...).
    pub label: String,
    pub argv: Vec<String>,
    /// Working directory; `None` means the caller's current directory.
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new<I, S>(label: impl Into<String>, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.into(),
            argv: argv.into_iter().map(Into::into).collect(),
            cwd: None,
        }
    }

    /// Run `script` through `sh -c` (or `cmd /C` on Windows).
    pub fn shell(label: impl Into<String>, script: &str) -> Self {
        let argv = if cfg!(windows) {
            vec!["cmd".to_string(), "/C".to_string(), script.to_string()]
        } else {
            vec!["sh".to_string(), "-c".to_string(), script.to_string()]
        };
        Self {
            label: label.into(),
            argv,
            cwd: None,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arg in &self.argv {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, "{arg:?}")?;
            } else {
                f.write_str(arg)?;
            }
        }
        Ok(())
    }
}
