//! Engine lifecycle: one capability-scoped Lua state per suite.
//!
//! An [`Engine`] is either fully initialized (after [`Engine::create`]) or fully destroyed. Destruction
//! runs once: [`Engine::destroy`] is idempotent, and `Drop` destroys an engine nobody destroyed
//! explicitly, so every exit path (early return, discovery failure, panic) tears the state down.

pub mod policy;
pub mod raised;

use miette::Diagnostic;
use mlua::{Error as LuaError, Lua, LuaOptions, Table, Value};
use thiserror::Error;

pub use policy::{CapabilityPolicy, HostAccess, StdlibProfile};
pub use raised::{raised_from_lua, script_error};

const DESTROYED: &str = "script engine has been destroyed";

/// The engine could not be created under the requested capability policy.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineInitError {
    #[error("cannot open the requested Lua standard libraries")]
    #[diagnostic(
        code(scriptest::engine::stdlib),
        help("only safe libraries can be opened; drop `debug` from the policy")
    )]
    Stdlib(#[source] LuaError),

    #[error("cannot apply a memory limit of {limit} bytes")]
    #[diagnostic(code(scriptest::engine::memory_limit))]
    MemoryLimit {
        limit: usize,
        #[source]
        source: LuaError,
    },
}

/// Destroying the engine faulted. Reported next to, never instead of, case results.
#[derive(Debug, Error, Diagnostic)]
pub enum TeardownError {
    #[error("final garbage collection failed during engine teardown")]
    #[diagnostic(code(scriptest::engine::teardown))]
    Collect(#[source] LuaError),
}

/// A Lua state plus the policy it was created under.
pub struct Engine {
    lua: Option<Lua>,
    policy: CapabilityPolicy,
}

impl Engine {
    /// Create an engine with the standard libraries and limits `policy` asks for.
    #[tracing::instrument(skip_all, fields(stdlib = ?policy.stdlib, memory_limit = ?policy.memory_limit))]
    pub fn create(policy: CapabilityPolicy) -> Result<Self, EngineInitError> {
        let lua = Lua::new_with(policy.stdlib.libs(), LuaOptions::new()).map_err(EngineInitError::Stdlib)?;

        if let Some(limit) = policy.memory_limit {
            lua.set_memory_limit(limit)
                .map_err(|source| EngineInitError::MemoryLimit { limit, source })?;
        }

        tracing::debug!("script engine created");
        Ok(Self { lua: Some(lua), policy })
    }

    pub fn policy(&self) -> &CapabilityPolicy {
        &self.policy
    }

    pub fn is_destroyed(&self) -> bool {
        self.lua.is_none()
    }

    /// The live Lua state, or an error once the engine is destroyed.
    pub fn lua(&self) -> mlua::Result<&Lua> {
        self.lua.as_ref().ok_or_else(|| LuaError::RuntimeError(DESTROYED.to_string()))
    }

    /// Evaluate `source` as a chunk named `chunk_name` and return its first value.
    pub fn evaluate(&self, chunk_name: &str, source: &str) -> mlua::Result<Value> {
        self.lua()?.load(source).set_name(format!("@{chunk_name}")).eval()
    }

    /// The global binding namespace.
    pub fn globals(&self) -> mlua::Result<Table> {
        Ok(self.lua()?.globals())
    }

    /// Tear the engine down. Later calls are no-ops.
    pub fn destroy(&mut self) -> Result<(), TeardownError> {
        let Some(lua) = self.lua.take() else {
            return Ok(());
        };

        let collected = lua.gc_collect();
        drop(lua);
        collected.map_err(TeardownError::Collect)?;

        tracing::debug!("script engine destroyed");
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(err) = self.destroy() {
            tracing::error!(error = %err, "engine teardown failed while dropping");
        }
    }
}
