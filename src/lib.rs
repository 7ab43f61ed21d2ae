#![forbid(unsafe_code)]
//! scriptest: run Lua test scripts under a native test-reporting protocol.
//!
//! A [`Suite`] owns one capability-scoped Lua engine. Building it installs the interop bindings,
//! evaluates every declared unit and turns what each unit returns into named test cases. Running it
//! reports `started`/`finished`/`failed` for every case to a [`RunNotifier`], with failures translated
//! so a host error raised through a script is reported as itself rather than as an engine wrapper.
//!
//! ```rust,no_run
//! use scriptest::{ConsoleReporter, SuiteBuilder};
//!
//! let suite = SuiteBuilder::new("ExampleTestSuite")
//!     .root("tests/fixtures/scripts")
//!     .units(["ExampleTestOne.lua", "TestFileUnderTest.lua"])
//!     .build()?;
//! println!("{}", suite.description());
//! let report = suite.run(&mut ConsoleReporter::new(true));
//! assert!(report.is_success());
//! # Ok::<(), scriptest::SuiteError>(())
//! ```
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Harness**: [`harness::run_declared`] panics on purpose; a panic is how a `#[test]` fails.

pub mod cli;
pub mod discovery;
pub mod engine;
pub mod harness;
pub mod interop;
pub mod manifest;
pub mod reporter;
pub mod resolver;
pub mod suite;
pub mod version;

pub use discovery::{DiscoveryError, discover};
pub use engine::{CapabilityPolicy, Engine, EngineInitError, HostAccess, StdlibProfile, TeardownError};
pub use interop::{Bindings, HostObject, Interop, InteropError, RandomHelper};
pub use manifest::{Manifest, ManifestError, SuiteConfig};
pub use reporter::{ConsoleReporter, JsonReporter, tree_to_json};
pub use resolver::{DirResolver, MemoryResolver, ResolveError, SourceResolver};
pub use suite::{NoTestsRemain, RunReport, Suite, SuiteBuilder, SuiteError};

pub use scriptest_core::{CaseId, Cause, IdentityTree, RunNotifier, RunSummary, ScriptError, TestCase, TestGroup};
