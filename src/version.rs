//! scriptest version information.
//!
//! The CLI `--version` flag and any embedder that wants to log the bridge version read this constant
//! instead of repeating `env!("CARGO_PKG_VERSION")`.

/// The scriptest version string (for example, `0.1.0-alpha.1`).
pub const SCRIPTEST_VERSION: &str = env!("CARGO_PKG_VERSION");
