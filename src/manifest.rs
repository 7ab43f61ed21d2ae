//! `scriptest.toml`: declarative suite configuration.
//!
//! ```toml
//! [suite]
//! name = "ExampleTestSuite"
//! root = "scripts"              # relative to the manifest; default: the manifest's directory
//! units = ["ExampleTestOne.lua", "TestFileUnderTest.lua"]
//!
//! [capabilities]
//! stdlib = "minimal"            # "safe" (default) | "minimal"
//! host_allow = ["scriptest."]   # prefix allow-list for host.type(); omitted = unrestricted
//! memory_limit = 67108864       # bytes
//!
//! [helpers.random]              # install a RandomHelper as the global `random`
//! seed = 7
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::engine::{CapabilityPolicy, StdlibProfile};
use crate::interop::{Bindings, RandomHelper};
use crate::suite::SuiteBuilder;

/// Default manifest file name.
pub const MANIFEST_FILE: &str = "scriptest.toml";

/// Name under which the bundled random helper is registered for `host.type(..)`.
pub const RANDOM_HOST_TYPE: &str = "scriptest.Random";

/// Global name of the optional random helper.
pub const RANDOM_GLOBAL: &str = "random";

#[derive(Debug, Error, Diagnostic)]
pub enum ManifestError {
    #[error("cannot read manifest `{path}`")]
    #[diagnostic(code(scriptest::manifest::read))]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse manifest `{path}`")]
    #[diagnostic(code(scriptest::manifest::parse))]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid manifest: {reason}")]
    #[diagnostic(code(scriptest::manifest::invalid))]
    Invalid { reason: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub suite: SuiteSection,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub helpers: Helpers,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteSection {
    pub name: String,
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub units: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Capabilities {
    pub stdlib: Option<String>,
    pub host_allow: Option<Vec<String>>,
    pub memory_limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Helpers {
    pub random: Option<RandomConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomConfig {
    pub seed: Option<u64>,
}

/// Parse manifest text without validating it.
pub fn load(contents: &str) -> Result<Manifest, toml::de::Error> {
    toml::from_str(contents)
}

impl Manifest {
    /// Read, parse and validate the manifest at `path`.
    pub fn read(path: &Path) -> Result<Self, ManifestError> {
        let contents = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = load(&contents).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        let invalid = |reason: &str| Err(ManifestError::Invalid { reason: reason.to_string() });

        if self.suite.name.trim().is_empty() {
            return invalid("suite.name cannot be empty");
        }
        if self.suite.units.is_empty() {
            return invalid("suite.units must name at least one test unit");
        }
        if self.suite.units.iter().any(|unit| unit.trim().is_empty()) {
            return invalid("suite.units cannot contain empty names");
        }
        self.stdlib()?;
        if self.capabilities.memory_limit == Some(0) {
            return invalid("capabilities.memory_limit must be positive");
        }
        Ok(())
    }

    fn stdlib(&self) -> Result<StdlibProfile, ManifestError> {
        match self.capabilities.stdlib.as_deref() {
            None => Ok(StdlibProfile::Safe),
            Some(value) => StdlibProfile::parse(value).ok_or_else(|| ManifestError::Invalid {
                reason: format!("capabilities.stdlib must be \"safe\" or \"minimal\", got {value:?}"),
            }),
        }
    }

    /// The capability policy the manifest asks for.
    pub fn policy(&self) -> Result<CapabilityPolicy, ManifestError> {
        let mut policy = CapabilityPolicy::default().with_stdlib(self.stdlib()?);
        if let Some(prefixes) = &self.capabilities.host_allow {
            policy = policy.allow_prefixes(prefixes.clone());
        }
        if let Some(limit) = self.capabilities.memory_limit {
            policy = policy.with_memory_limit(limit);
        }
        Ok(policy)
    }

    /// Resolve into a [`SuiteConfig`]; relative paths are taken against `base_dir`.
    pub fn into_config(self, base_dir: &Path) -> Result<SuiteConfig, ManifestError> {
        let policy = self.policy()?;
        let root = match &self.suite.root {
            Some(root) => base_dir.join(root),
            None => base_dir.to_path_buf(),
        };
        Ok(SuiteConfig {
            name: self.suite.name,
            root,
            units: self.suite.units,
            policy,
            random: self.helpers.random,
        })
    }
}

/// Fully resolved suite settings, from a manifest or from command-line arguments.
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub name: String,
    pub root: PathBuf,
    pub units: Vec<String>,
    pub policy: CapabilityPolicy,
    pub random: Option<RandomConfig>,
}

impl SuiteConfig {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, units: Vec<String>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            units,
            policy: CapabilityPolicy::default(),
            random: None,
        }
    }

    /// The bindings every configured suite gets: `scriptest.Random` as a host type, plus the `random`
    /// global when `[helpers.random]` is present.
    pub fn bindings(&self) -> Bindings {
        let seed = self.random.as_ref().and_then(|random| random.seed);
        let helper = seed.map_or_else(RandomHelper::new, RandomHelper::seeded);

        let bindings = Bindings::new().host_type(RANDOM_HOST_TYPE, helper.clone());
        match self.random {
            Some(_) => bindings.helper(RANDOM_GLOBAL, helper),
            None => bindings,
        }
    }

    pub fn builder(self) -> SuiteBuilder {
        let bindings = self.bindings();
        SuiteBuilder::new(self.name)
            .units(self.units)
            .policy(self.policy)
            .bindings(bindings)
            .root(self.root)
    }
}
