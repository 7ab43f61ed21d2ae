//! Source resolution: turning a declared unit name into script source text.
//!
//! [`DirResolver`] reads units below a root directory (the usual case). [`MemoryResolver`] serves
//! in-memory sources for embedders and tests.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Maximum unit source size (16 MiB)
///
/// Larger files are rejected before they are read.
pub const MAX_SOURCE_SIZE: u64 = 16 * 1024 * 1024;

#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    #[error("test unit `{name}` was not found")]
    #[diagnostic(code(scriptest::resolve::not_found))]
    NotFound { name: String },

    #[error("test unit `{name}` escapes the source root")]
    #[diagnostic(
        code(scriptest::resolve::escapes_root),
        help("unit names are relative to the source root and may not contain `..`")
    )]
    EscapesRoot { name: String },

    #[error("test unit `{name}` is too large ({size} bytes, max {max} bytes)")]
    #[diagnostic(code(scriptest::resolve::too_large))]
    TooLarge { name: String, size: u64, max: u64 },

    #[error("cannot read test unit `{name}`")]
    #[diagnostic(code(scriptest::resolve::io))]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Look up the source text of a named unit.
pub trait SourceResolver {
    fn resolve(&self, name: &str) -> Result<String, ResolveError>;
}

/// Resolves unit names as paths relative to a root directory.
#[derive(Debug, Clone)]
pub struct DirResolver {
    root: PathBuf,
}

impl DirResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn unit_path(&self, name: &str) -> Result<PathBuf, ResolveError> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes {
            return Err(ResolveError::EscapesRoot { name: name.to_string() });
        }
        Ok(self.root.join(relative))
    }
}

impl SourceResolver for DirResolver {
    fn resolve(&self, name: &str) -> Result<String, ResolveError> {
        let path = self.unit_path(name)?;

        let metadata = fs::metadata(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ResolveError::NotFound { name: name.to_string() },
            _ => ResolveError::Io {
                name: name.to_string(),
                source,
            },
        })?;
        if !metadata.is_file() {
            return Err(ResolveError::NotFound { name: name.to_string() });
        }
        if metadata.len() > MAX_SOURCE_SIZE {
            return Err(ResolveError::TooLarge {
                name: name.to_string(),
                size: metadata.len(),
                max: MAX_SOURCE_SIZE,
            });
        }

        fs::read_to_string(&path).map_err(|source| ResolveError::Io {
            name: name.to_string(),
            source,
        })
    }
}

/// Resolves unit names from an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    sources: HashMap<String, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.insert(name.into(), source.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(name.into(), source.into());
    }
}

impl SourceResolver for MemoryResolver {
    fn resolve(&self, name: &str) -> Result<String, ResolveError> {
        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound { name: name.to_string() })
    }
}
