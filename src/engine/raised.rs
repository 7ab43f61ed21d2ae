//! Classify `mlua` errors into the engine-agnostic [`Raised`] variant.
//!
//! A Rust callback that returns `Err(mlua::Error::external(e))` surfaces in the calling Rust code as
//! `CallbackError { cause: ExternalError(e), .. }`, possibly behind further `CallbackError` /
//! `WithContext` links when callbacks nest. Only that shape wraps a host cause. Everything else
//! (`error(..)` in a script, syntax errors, bad arguments passed to a callback, script errors raised by an
//! `include`d file) is a script-level failure.

use std::sync::Arc;

use mlua::Error as LuaError;
use scriptest_core::{EngineRaised, HostError, Raised, ScriptError};

/// Translate an engine error into the failure a test case raised.
pub fn raised_from_lua(err: &LuaError) -> Raised {
    let raw = script_error(err);
    match host_cause(err) {
        Some((cause, traceback)) => EngineRaised::wrapping_host(cause, traceback, raw).into(),
        None => EngineRaised::script(raw).into(),
    }
}

/// The host error at the end of the callback chain, with the innermost traceback recorded on the way.
fn host_cause(err: &LuaError) -> Option<(HostError, Option<String>)> {
    match err {
        LuaError::ExternalError(cause) => Some((Arc::clone(cause), None)),
        LuaError::CallbackError { traceback, cause } => {
            host_cause(cause).map(|(host, inner)| (host, inner.or_else(|| Some(traceback.clone()))))
        }
        LuaError::WithContext { cause, .. } => host_cause(cause),
        _ => None,
    }
}

/// Render an engine error as a script failure, looking through callback wrappers.
pub fn script_error(err: &LuaError) -> ScriptError {
    match err {
        LuaError::RuntimeError(msg) => ScriptError::from_engine_message(msg),
        LuaError::SyntaxError { message, .. } => ScriptError::new(message.clone()),
        LuaError::CallbackError { traceback, cause } => {
            let mut inner = script_error(cause);
            if inner.traceback.is_none() {
                inner.traceback = Some(traceback.clone());
            }
            inner
        }
        LuaError::WithContext { context, cause } => {
            let mut inner = script_error(cause);
            inner.message = format!("{context}: {}", inner.message);
            inner
        }
        other => ScriptError::from_engine_message(&other.to_string()),
    }
}
