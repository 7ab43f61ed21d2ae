//! `cargo test` integration.
//!
//! ```rust,ignore
//! scriptest::script_suite!(example_suite, root = "tests/fixtures/scripts", units = ["A.lua", "B.lua"]);
//! ```
//!
//! expands to a `#[test] fn example_suite()` that discovers and runs the units (with `root` taken
//! relative to the calling crate's manifest directory), prints a verbose report, and panics with a
//! summary when any case fails.

use std::path::PathBuf;

use crate::manifest::SuiteConfig;
use crate::reporter::ConsoleReporter;

/// Declare a script suite as a `#[test]` function.
#[macro_export]
macro_rules! script_suite {
    ($name:ident, root = $root:expr, units = [$($unit:expr),* $(,)?] $(,)?) => {
        #[test]
        fn $name() {
            $crate::harness::run_declared(
                stringify!($name),
                ::std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join($root),
                &[$($unit),*],
            );
        }
    };
}

/// Build and run a suite, panicking on any failure. Used by [`script_suite!`].
pub fn run_declared(name: &str, root: PathBuf, units: &[&str]) {
    let units = units.iter().map(|unit| unit.to_string()).collect();
    let suite = match SuiteConfig::new(name, root, units).builder().build() {
        Ok(suite) => suite,
        Err(err) => panic!("{:?}", miette::Report::new(err)),
    };

    let mut reporter = ConsoleReporter::with_writer(Vec::new(), true);
    let report = suite.run(&mut reporter);
    // Route through `eprint!` so libtest captures it.
    eprint!("{}", String::from_utf8_lossy(&reporter.into_inner()));

    if let Err(err) = &report.teardown {
        panic!("suite `{name}`: {err}");
    }
    if !report.summary.is_success() {
        panic!(
            "suite `{name}`: {} of {} cases failed",
            report.summary.failed, report.summary.total
        );
    }
}
