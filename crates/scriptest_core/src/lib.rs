//! Provide the engine-agnostic half of the scriptest bridge.
//!
//! A host test framework wants a static tree of named identities and a started/finished/failed event
//! stream. A script engine produces test cases at load time and raises errors that may wrap host-side
//! failures. This crate holds everything about that translation which does not depend on a concrete
//! engine:
//!
//! - [`model`]: `TestCase` / `TestGroup`, the records discovery produces.
//! - [`identity`]: display-name transposition and the two-level identity tree.
//! - [`failure`]: the `Raised` variant an engine adapter produces and the pure [`failure::translate`].
//! - [`notify`]: the push side of the host reporting protocol.
//! - [`execute`]: the sequential, per-case isolated execution loop.
//!
//! ## Notes
//!
//! - This is a "semantic core" crate: **no IO**, no global state, and no engine dependency. The root crate
//!   adapts a real engine (Lua via `mlua`) onto these types; `tests/layering_guard.rs` keeps it that way.

pub mod execute;
pub mod failure;
pub mod identity;
pub mod model;
pub mod notify;

pub use execute::{RunSummary, execute};
pub use failure::{Cause, EngineRaised, HostError, Raised, ScriptError, translate};
pub use identity::{CaseId, GroupIdentity, IdentityTree, build_tree, display_name};
pub use model::{Invoke, TestCase, TestGroup};
pub use notify::RunNotifier;
