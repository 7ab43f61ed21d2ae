//! CLI module for scriptest
//!
//! ## Commands
//!
//! - `run [UNITS]...` - Discover and run script test units
//! - `list [UNITS]...` - Print the identity tree without running anything
//!
//! Units come from positional arguments, from `--manifest FILE`, or from `./scriptest.toml` when neither
//! is given.
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::version::SCRIPTEST_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }

    /// Render a diagnostic (code, help, source chain) as the error message.
    pub fn diagnostic(err: impl miette::Diagnostic + Send + Sync + 'static) -> Self {
        Self::failure(format!("{:?}", miette::Report::new(err)))
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Run Lua test scripts and report them like native tests
#[derive(Parser, Debug)]
#[command(name = "scriptest")]
#[command(version = SCRIPTEST_VERSION)]
#[command(about = "Run Lua test scripts and report them like native tests", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Where a suite's units come from.
#[derive(Args, Debug, Clone, Default)]
pub struct SuiteArgs {
    /// Test units to load, in order (relative to --root)
    #[arg(value_name = "UNITS")]
    pub units: Vec<String>,

    /// Directory units and `include` paths are resolved against (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Suite manifest (default: ./scriptest.toml when no units are given)
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Discover and run test units
    Run {
        #[command(flatten)]
        suite: SuiteArgs,
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
        /// Only run cases whose `group::case` id contains EXPR
        #[arg(short = 'k', value_name = "EXPR")]
        filter: Option<String>,
        /// Report format
        #[arg(long, value_enum, default_value_t = RunFormat::Console)]
        format: RunFormat,
        /// Limit `host.type` lookups to names with this prefix (repeatable)
        #[arg(long = "restrict", value_name = "PREFIX")]
        restrict: Vec<String>,
    },

    /// Print the discovered identity tree without running any case
    List {
        #[command(flatten)]
        suite: SuiteArgs,
        /// Output format
        #[arg(long, value_enum, default_value_t = ListFormat::Text)]
        format: ListFormat,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunFormat {
    Console,
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    Text,
    Json,
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Run {
            suite,
            verbose,
            filter,
            format,
            restrict,
        } => commands::run_suite(&suite, verbose, filter.as_deref(), format, restrict),
        Command::List { suite, format } => commands::list_suite(&suite, format),
    }
}

// ============================================================================
// Tests
// ============================================================================
