//! Interop surface: the global bindings installed into an engine before any test unit runs.
//!
//! The set is declared up front in [`Bindings`] and fixed once handed to [`Interop`]:
//!
//! - `include(path)`: read a Lua file from disk (relative to the load root) and evaluate it in the same
//!   engine, returning its values. Lua already owns the global `load`, hence the name.
//! - `host`: `host.type(name)` returns a registered host type if the capability policy allows `name`;
//!   `host.available()` lists the names it would allow.
//! - every declared helper, as a global under its own name.
//!
//! Installation writes only those names and never replaces an existing global.

pub mod helpers;

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use miette::Diagnostic;
use mlua::{Error as LuaError, Function, Lua, MultiValue, Table};
use thiserror::Error;

use crate::engine::{CapabilityPolicy, Engine};

pub use helpers::{HelperError, HostObject, RandomHelper};

/// Global name of the file-load primitive.
pub const LOAD_BINDING: &str = "include";
/// Global name of the host lookup table.
pub const HOST_BINDING: &str = "host";

/// Installing bindings failed. Nothing was written when this is returned.
#[derive(Debug, Error, Diagnostic)]
pub enum InteropError {
    #[error("`{name}` is reserved by the interop surface")]
    #[diagnostic(code(scriptest::interop::reserved))]
    Reserved { name: String },

    #[error("binding `{name}` is declared more than once")]
    #[diagnostic(code(scriptest::interop::duplicate))]
    Duplicate { name: String },

    #[error("binding `{name}` would replace an existing global")]
    #[diagnostic(
        code(scriptest::interop::conflict),
        help("pick a helper name that is not a Lua builtin or library")
    )]
    Conflict { name: String },

    #[error(transparent)]
    #[diagnostic(code(scriptest::interop::engine))]
    Engine(#[from] LuaError),
}

/// `include(path)` could not read its file.
#[derive(Debug, Error)]
#[error("cannot include `{path}`: {source}")]
pub struct LoadError {
    pub path: String,
    #[source]
    pub source: io::Error,
}

/// `host.type(name)` refused a lookup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostAccessError {
    #[error("host type `{name}` is not accessible under the current capability policy")]
    Denied { name: String },
    #[error("no host type named `{name}` is registered")]
    Unknown { name: String },
}

type NamedObjects = Vec<(String, Arc<dyn HostObject>)>;

/// The declared binding set.
pub struct Bindings {
    load_root: PathBuf,
    helpers: NamedObjects,
    host_types: NamedObjects,
}

impl Default for Bindings {
    fn default() -> Self {
        Self {
            load_root: PathBuf::from("."),
            helpers: Vec::new(),
            host_types: Vec::new(),
        }
    }
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory `include` resolves relative paths against.
    pub fn load_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.load_root = root.into();
        self
    }

    /// Declare a helper installed as the global `name`.
    pub fn helper(mut self, name: impl Into<String>, object: impl HostObject + 'static) -> Self {
        let object: Arc<dyn HostObject> = Arc::new(object);
        self.helpers.push((name.into(), object));
        self
    }

    /// Register a host type reachable through `host.type(name)`, subject to the capability policy.
    pub fn host_type(mut self, name: impl Into<String>, object: impl HostObject + 'static) -> Self {
        let object: Arc<dyn HostObject> = Arc::new(object);
        self.host_types.push((name.into(), object));
        self
    }

    /// Every global name installation will write, in installation order.
    pub fn declared_names(&self) -> Vec<&str> {
        let mut names = vec![LOAD_BINDING, HOST_BINDING];
        names.extend(self.helpers.iter().map(|(name, _)| name.as_str()));
        names
    }

    pub fn host_type_names(&self) -> impl Iterator<Item = &str> {
        self.host_types.iter().map(|(name, _)| name.as_str())
    }
}

/// Installs a fixed [`Bindings`] set into an engine, once.
pub struct Interop {
    load_root: PathBuf,
    helpers: NamedObjects,
    host_types: Arc<NamedObjects>,
    installed: bool,
}

impl Interop {
    pub fn new(bindings: Bindings) -> Self {
        Self {
            load_root: bindings.load_root,
            helpers: bindings.helpers,
            host_types: Arc::new(bindings.host_types),
            installed: false,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Install the declared bindings into `engine`. Calling it again is a no-op.
    pub fn install(&mut self, engine: &Engine) -> Result<(), InteropError> {
        if self.installed {
            return Ok(());
        }

        let lua = engine.lua()?;
        let globals = lua.globals();
        self.validate(&globals)?;

        globals.set(LOAD_BINDING, include_fn(lua, self.load_root.clone())?)?;
        globals.set(
            HOST_BINDING,
            host_table(lua, Arc::clone(&self.host_types), engine.policy().clone())?,
        )?;
        for (name, object) in &self.helpers {
            globals.set(name.as_str(), object.to_lua(lua)?)?;
        }

        self.installed = true;
        tracing::debug!(
            helpers = self.helpers.len(),
            host_types = self.host_types.len(),
            "interop bindings installed"
        );
        Ok(())
    }

    fn validate(&self, globals: &Table) -> Result<(), InteropError> {
        let mut seen = HashSet::new();
        for (name, _) in &self.helpers {
            if name == LOAD_BINDING || name == HOST_BINDING {
                return Err(InteropError::Reserved { name: name.clone() });
            }
            if !seen.insert(name.as_str()) {
                return Err(InteropError::Duplicate { name: name.clone() });
            }
        }

        let declared = [LOAD_BINDING, HOST_BINDING]
            .into_iter()
            .chain(self.helpers.iter().map(|(name, _)| name.as_str()));
        for name in declared {
            let existing: mlua::Value = globals.raw_get(name)?;
            if !existing.is_nil() {
                return Err(InteropError::Conflict { name: name.to_string() });
            }
        }
        Ok(())
    }
}

fn include_fn(lua: &Lua, load_root: PathBuf) -> mlua::Result<Function> {
    lua.create_function(move |lua, path: String| {
        let source = read_include(&load_root, &path).map_err(LuaError::external)?;
        tracing::debug!(path = %path, "including script");
        lua.load(source.as_str()).set_name(format!("@{path}")).eval::<MultiValue>()
    })
}

fn read_include(load_root: &Path, path: &str) -> Result<String, LoadError> {
    fs::read_to_string(load_root.join(path)).map_err(|source| LoadError {
        path: path.to_string(),
        source,
    })
}

fn host_table(lua: &Lua, host_types: Arc<NamedObjects>, policy: CapabilityPolicy) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    let types = Arc::clone(&host_types);
    let lookup_policy = policy.clone();
    let lookup = lua.create_function(move |lua, name: String| {
        if !lookup_policy.allows_host(&name) {
            return Err(LuaError::external(HostAccessError::Denied { name }));
        }
        match types.iter().find(|(registered, _)| *registered == name) {
            Some((_, object)) => object.to_lua(lua),
            None => Err(LuaError::external(HostAccessError::Unknown { name })),
        }
    })?;
    table.set("type", lookup)?;

    let available = lua.create_function(move |_, ()| {
        Ok(host_types
            .iter()
            .map(|(name, _)| name.clone())
            .filter(|name| policy.allows_host(name))
            .collect::<Vec<_>>())
    })?;
    table.set("available", available)?;

    Ok(table)
}
