//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use scriptest_core::RunNotifier;

use crate::manifest::{MANIFEST_FILE, Manifest, SuiteConfig};
use crate::reporter::{ConsoleReporter, JsonReporter, tree_to_json};
use crate::suite::Suite;

use super::{CliError, CliResult, ExitCode, ListFormat, RunFormat, SuiteArgs};

/// Suite name used when units come from the command line.
const DEFAULT_SUITE_NAME: &str = "scriptest";

// ============================================================================
// Suite configuration
// ============================================================================

/// Work out the suite to load from `--manifest`, `./scriptest.toml`, or positional units.
///
/// Positional units and `--root` override what a manifest declares.
pub fn resolve_config(args: &SuiteArgs) -> CliResult<SuiteConfig> {
    let manifest_path = match &args.manifest {
        Some(path) => Some(path.clone()),
        None if args.units.is_empty() && Path::new(MANIFEST_FILE).is_file() => Some(PathBuf::from(MANIFEST_FILE)),
        None => None,
    };

    let mut config = match manifest_path {
        Some(path) => {
            let manifest = Manifest::read(&path).map_err(CliError::diagnostic)?;
            let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            tracing::debug!(manifest = %path.display(), "loaded suite manifest");
            manifest.into_config(&base_dir).map_err(CliError::diagnostic)?
        }
        None => SuiteConfig::new(DEFAULT_SUITE_NAME, ".", Vec::new()),
    };

    if !args.units.is_empty() {
        config.units = args.units.clone();
    }
    if let Some(root) = &args.root {
        config.root = root.clone();
    }
    if config.units.is_empty() {
        return Err(CliError::failure(format!(
            "Error: no test units given (pass UNITS, --manifest, or create {MANIFEST_FILE})"
        )));
    }
    Ok(config)
}

fn build_suite(config: SuiteConfig) -> CliResult<Suite> {
    config.builder().build().map_err(CliError::diagnostic)
}

// ============================================================================
// Commands
// ============================================================================

/// `scriptest run`
pub fn run_suite(
    args: &SuiteArgs,
    verbose: bool,
    filter: Option<&str>,
    format: RunFormat,
    restrict: Vec<String>,
) -> CliResult<ExitCode> {
    let mut config = resolve_config(args)?;
    if !restrict.is_empty() {
        config.policy = config.policy.allow_prefixes(restrict);
    }

    let mut suite = build_suite(config)?;
    if let Some(keyword) = filter {
        let kept = suite.filter(|group, case| format!("{group}::{}", case.name()).contains(keyword));
        if kept.is_err() {
            eprintln!("No tests collected");
            return Ok(ExitCode::SUCCESS); // "no tests collected" is not a failure
        }
    }

    let mut reporter: Box<dyn RunNotifier> = match format {
        RunFormat::Console => Box::new(ConsoleReporter::new(verbose)),
        RunFormat::Json => Box::new(JsonReporter::stdout()),
    };
    let report = suite.run(reporter.as_mut());

    if let Err(err) = report.teardown {
        return Err(CliError::diagnostic(err));
    }
    if report.summary.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// `scriptest list`
pub fn list_suite(args: &SuiteArgs, format: ListFormat) -> CliResult<ExitCode> {
    let suite = build_suite(resolve_config(args)?)?;
    let tree = suite.description();

    let rendered = match format {
        ListFormat::Text => tree.to_string(),
        ListFormat::Json => format!("{:#}\n", tree_to_json(&tree)),
    };
    io::stdout()
        .write_all(rendered.as_bytes())
        .map_err(|e| CliError::failure(format!("Error writing output: {e}")))?;
    Ok(ExitCode::SUCCESS)
}
