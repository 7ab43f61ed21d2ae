//! Host helper objects scripts can be given.
//!
//! Any `mlua::UserData + Clone + Send + Sync` value can be declared as a helper; [`RandomHelper`] is the
//! one that ships with the crate.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mlua::{Error as LuaError, Lua, UserData, UserDataMethods, Value};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use thiserror::Error;

/// Largest byte count `random_hex` will produce in one call.
pub const MAX_RANDOM_BYTES: usize = 4096;

/// A host value that can be materialized inside an engine.
pub trait HostObject: Send + Sync {
    fn to_lua(&self, lua: &Lua) -> mlua::Result<Value>;
}

impl<T: UserData + Clone + Send + Sync + 'static> HostObject for T {
    fn to_lua(&self, lua: &Lua) -> mlua::Result<Value> {
        lua.create_userdata(self.clone()).map(Value::UserData)
    }
}

/// Host-side failure raised by a helper method.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HelperError {
    #[error("{method}: {reason}")]
    InvalidArgument { method: &'static str, reason: String },
}

/// Randomness for scripts, backed by a host RNG.
///
/// Lua side: `random:random_hex(n)` returns `n` random bytes as lowercase hex; `random:random_int(bound)`
/// returns an integer in `[0, bound)`.
#[derive(Clone)]
pub struct RandomHelper {
    rng: Arc<Mutex<StdRng>>,
}

impl RandomHelper {
    /// A helper seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
        }
    }

    /// A deterministic helper; the same seed yields the same sequence.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    // A poisoned lock still holds a usable generator.
    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn random_hex(&self, byte_len: usize) -> Result<String, HelperError> {
        if byte_len > MAX_RANDOM_BYTES {
            return Err(HelperError::InvalidArgument {
                method: "random_hex",
                reason: format!("byte length {byte_len} exceeds {MAX_RANDOM_BYTES}"),
            });
        }
        let mut bytes = vec![0u8; byte_len];
        self.rng().fill_bytes(&mut bytes);
        Ok(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    pub fn random_int(&self, bound: i64) -> Result<i64, HelperError> {
        if bound <= 0 {
            return Err(HelperError::InvalidArgument {
                method: "random_int",
                reason: format!("bound must be positive, got {bound}"),
            });
        }
        Ok(self.rng().gen_range(0..bound))
    }
}

impl Default for RandomHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl UserData for RandomHelper {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("random_hex", |_, this, byte_len: usize| {
            this.random_hex(byte_len).map_err(LuaError::external)
        });
        methods.add_method("random_int", |_, this, bound: i64| {
            this.random_int(bound).map_err(LuaError::external)
        });
    }
}
