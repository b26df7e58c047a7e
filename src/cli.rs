// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `cirun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cirun",
    version,
    about = "Run CI builds and test suites with bounded concurrency and fail-fast cancellation.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML). A missing file means built-in defaults.
    #[arg(long, global = true, value_name = "PATH", default_value = "Cirun.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CIRUN_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run test suites. With no category flags, everything runs.
    Test(TestArgs),
    /// Build one or more boards in parallel.
    Build(BuildArgs),
    /// Run arbitrary shell commands concurrently.
    Fanout(FanoutArgs),
}

#[derive(Debug, Clone, Args)]
pub struct TestArgs {
    /// C++ unit tests.
    #[arg(long)]
    pub unit: bool,

    /// Example compilation tests.
    #[arg(long)]
    pub examples: bool,

    /// Python tests.
    #[arg(long)]
    pub py: bool,

    /// Integration tests.
    #[arg(long)]
    pub integration: bool,

    /// Library sources changed; mixed runs also compile for uno.
    #[arg(long)]
    pub source_changed: bool,

    /// Print all output, not just failures and test progress.
    #[arg(long, short)]
    pub verbose: bool,

    /// Print the selected plan without running anything.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    /// Boards to build.
    #[arg(required = true, value_name = "BOARD")]
    pub boards: Vec<String>,

    /// Maximum parallel builds (default: CPU count).
    #[arg(long, short, value_name = "N")]
    pub jobs: Option<usize>,

    /// Stream compiler output as it is produced.
    #[arg(long, short)]
    pub verbose: bool,

    /// Build every board even after one fails.
    #[arg(long, short = 'k')]
    pub keep_going: bool,
}

#[derive(Debug, Clone, Args)]
pub struct FanoutArgs {
    /// Maximum concurrent commands (default: one per command).
    #[arg(long, short, value_name = "N")]
    pub jobs: Option<usize>,

    /// Record non-zero exits without cancelling the other commands.
    #[arg(long)]
    pub no_check: bool,

    /// Commands, each a single shell string: `cirun fanout -- "a" "b"`.
    #[arg(last = true, required = true, value_name = "CMD")]
    pub commands: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subcommand_flags_parse() {
        let args = CliArgs::try_parse_from(["cirun", "test", "--unit", "--py", "--dry-run"]).unwrap();
        let Command::Test(t) = args.command else {
            panic!("expected test subcommand");
        };
        assert!(t.unit && t.py && t.dry_run);
        assert!(!t.examples && !t.integration);
        assert_eq!(args.config, "Cirun.toml");
    }

    #[test]
    fn fanout_takes_commands_after_double_dash() {
        let args =
            CliArgs::try_parse_from(["cirun", "fanout", "-j", "2", "--", "echo a", "echo b"]).unwrap();
        let Command::Fanout(f) = args.command else {
            panic!("expected fanout subcommand");
        };
        assert_eq!(f.jobs, Some(2));
        assert_eq!(f.commands, vec!["echo a", "echo b"]);
    }

    #[test]
    fn build_requires_a_board() {
        assert!(CliArgs::try_parse_from(["cirun", "build"]).is_err());
    }

    #[test]
    fn build_keep_going_flag() {
        let args = CliArgs::try_parse_from(["cirun", "build", "-k", "uno", "esp32dev"]).unwrap();
        let Command::Build(b) = args.command else {
            panic!("expected build subcommand");
        };
        assert!(b.keep_going);
        assert_eq!(b.boards, vec!["uno", "esp32dev"]);
    }
}
