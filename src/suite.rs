//! Suite lifecycle: engine creation, discovery, description, filtering and the run.
//!
//! A [`Suite`] owns its engine and the groups discovered in it. [`SuiteBuilder::build`] does all of the
//! loading up front, so [`Suite::description`] is exactly what [`Suite::run`] walks.

use std::path::PathBuf;

use miette::Diagnostic;
use scriptest_core::{IdentityTree, RunNotifier, RunSummary, TestCase, TestGroup, build_tree, execute};
use thiserror::Error;

use crate::discovery::{self, DiscoveryError};
use crate::engine::{CapabilityPolicy, Engine, EngineInitError, TeardownError};
use crate::interop::{Bindings, Interop};
use crate::resolver::{DirResolver, SourceResolver};

#[derive(Debug, Error, Diagnostic)]
pub enum SuiteError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Init(#[from] EngineInitError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// A filter removed every case.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
#[error("no tests remain in suite `{suite}` after filtering")]
#[diagnostic(code(scriptest::suite::no_tests_remain))]
pub struct NoTestsRemain {
    pub suite: String,
}

/// Result of [`Suite::run`]. Teardown faults are kept apart from case outcomes.
#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    pub teardown: Result<(), TeardownError>,
}

impl RunReport {
    /// Every case passed and the engine shut down cleanly.
    pub fn is_success(&self) -> bool {
        self.summary.is_success() && self.teardown.is_ok()
    }
}

/// Declares a suite: its units, where they come from, and the engine they run in.
pub struct SuiteBuilder {
    name: String,
    units: Vec<String>,
    resolver: Option<Box<dyn SourceResolver>>,
    root: Option<PathBuf>,
    policy: CapabilityPolicy,
    bindings: Bindings,
}

impl SuiteBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: Vec::new(),
            resolver: None,
            root: None,
            policy: CapabilityPolicy::default(),
            bindings: Bindings::new(),
        }
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.units.push(unit.into());
        self
    }

    pub fn units<I, S>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.units.extend(units.into_iter().map(Into::into));
        self
    }

    /// Where unit sources come from. Takes precedence over [`SuiteBuilder::root`] for unit lookup.
    pub fn resolver(mut self, resolver: impl SourceResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Resolve units with a [`DirResolver`] rooted at `root`, and use `root` as the `include` load root.
    ///
    /// Applied at [`SuiteBuilder::build`], so it holds whatever order the builder calls come in.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn policy(mut self, policy: CapabilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Create the engine, install bindings and discover every unit.
    ///
    /// On a discovery failure the engine is destroyed before the error is returned.
    #[tracing::instrument(skip_all, fields(suite = %self.name, units = self.units.len()))]
    pub fn build(self) -> Result<Suite, SuiteError> {
        let mut engine = Engine::create(self.policy)?;
        let bindings = match &self.root {
            Some(root) => self.bindings.load_root(root.clone()),
            None => self.bindings,
        };
        let mut interop = Interop::new(bindings);
        let resolver: Box<dyn SourceResolver> = match (self.resolver, self.root) {
            (Some(resolver), _) => resolver,
            (None, Some(root)) => Box::new(DirResolver::new(root)),
            (None, None) => Box::new(DirResolver::new(".")),
        };

        match discovery::discover(&engine, &mut interop, resolver.as_ref(), &self.units) {
            Ok(groups) => Ok(Suite {
                name: self.name,
                groups,
                engine,
            }),
            Err(err) => {
                if let Err(teardown) = engine.destroy() {
                    tracing::warn!(error = %teardown, "engine teardown failed after discovery error");
                }
                Err(err.into())
            }
        }
    }
}

/// A discovered suite, ready to describe and run.
pub struct Suite {
    name: String,
    groups: Vec<TestGroup>,
    engine: Engine,
}

impl Suite {
    pub fn builder(name: impl Into<String>) -> SuiteBuilder {
        SuiteBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn groups(&self) -> &[TestGroup] {
        &self.groups
    }

    /// The identity tree the host reports against.
    pub fn description(&self) -> IdentityTree {
        build_tree(&self.name, &self.groups)
    }

    /// Keep only the cases `keep` accepts (called with the group display name and the case).
    ///
    /// Relative order is preserved and groups left empty are dropped.
    pub fn filter(&mut self, mut keep: impl FnMut(&str, &TestCase) -> bool) -> Result<(), NoTestsRemain> {
        for group in &mut self.groups {
            let group_name = group.display_name();
            group.retain(|case| keep(&group_name, case));
        }
        self.groups.retain(|group| !group.is_empty());

        if self.groups.is_empty() {
            return Err(NoTestsRemain {
                suite: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Accepted for hosts that ask to sort. Discovery order is kept as is.
    pub fn sort<F>(&mut self, _compare: F)
    where
        F: FnMut(&TestCase, &TestCase) -> std::cmp::Ordering,
    {
        tracing::debug!(suite = %self.name, "sort requested; keeping discovery order");
    }

    /// Run every case, then tear down the engine.
    #[tracing::instrument(skip_all, fields(suite = %self.name))]
    pub fn run(self, notifier: &mut dyn RunNotifier) -> RunReport {
        let Suite {
            name,
            groups,
            mut engine,
        } = self;

        notifier.on_run_start(&build_tree(&name, &groups));
        let summary = execute(&groups, notifier);

        drop(groups);
        let teardown = engine.destroy();
        if let Err(err) = &teardown {
            tracing::error!(error = %err, "engine teardown failed");
        }

        notifier.on_run_complete(&summary);
        tracing::info!(
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            "suite finished"
        );
        RunReport { summary, teardown }
    }
}
