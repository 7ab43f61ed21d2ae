//! Capability policy: what a script environment may reach.

use std::fmt;
use std::sync::Arc;

use mlua::StdLib;

/// Which Lua standard libraries an engine opens. The base library (`print`, `error`, `pcall`, ...) is
/// always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdlibProfile {
    /// Every library `mlua` considers safe, including `io`, `os` and `package`.
    Safe,
    /// Pure computation only: `table`, `string`, `math`, `utf8`, `coroutine`.
    Minimal,
    /// An explicit library set. Unsafe libraries (`debug`) are rejected at engine creation.
    Custom(StdLib),
}

impl StdlibProfile {
    pub fn libs(self) -> StdLib {
        match self {
            StdlibProfile::Safe => StdLib::ALL_SAFE,
            StdlibProfile::Minimal => {
                StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8 | StdLib::COROUTINE
            }
            StdlibProfile::Custom(libs) => libs,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "safe" => Some(Self::Safe),
            "minimal" => Some(Self::Minimal),
            _ => None,
        }
    }
}

/// Which registered host types `host.type(name)` may return.
#[derive(Clone, Default)]
pub enum HostAccess {
    #[default]
    All,
    None,
    Allow(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl fmt::Debug for HostAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostAccess::All => f.write_str("All"),
            HostAccess::None => f.write_str("None"),
            HostAccess::Allow(_) => f.write_str("Allow(<predicate>)"),
        }
    }
}

/// The capability policy an engine is created under.
///
/// The default is unrestricted: safe standard libraries, every host type reachable, no memory limit.
#[derive(Debug, Clone)]
pub struct CapabilityPolicy {
    pub stdlib: StdlibProfile,
    pub host_access: HostAccess,
    /// Upper bound on Lua heap usage, in bytes.
    pub memory_limit: Option<usize>,
}

impl Default for CapabilityPolicy {
    fn default() -> Self {
        Self {
            stdlib: StdlibProfile::Safe,
            host_access: HostAccess::All,
            memory_limit: None,
        }
    }
}

impl CapabilityPolicy {
    /// Unrestricted policy (same as `default()`).
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Minimal standard libraries and host lookups limited to names accepted by `allow`.
    pub fn restricted(allow: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            stdlib: StdlibProfile::Minimal,
            host_access: HostAccess::Allow(Arc::new(allow)),
            memory_limit: None,
        }
    }

    /// Host lookups limited to names starting with one of `prefixes`.
    pub fn allow_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.host_access =
            HostAccess::Allow(Arc::new(move |name: &str| prefixes.iter().any(|p| name.starts_with(p.as_str()))));
        self
    }

    pub fn with_stdlib(mut self, stdlib: StdlibProfile) -> Self {
        self.stdlib = stdlib;
        self
    }

    pub fn with_host_access(mut self, host_access: HostAccess) -> Self {
        self.host_access = host_access;
        self
    }

    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Whether `host.type(name)` may return the host type registered as `name`.
    pub fn allows_host(&self, name: &str) -> bool {
        match &self.host_access {
            HostAccess::All => true,
            HostAccess::None => false,
            HostAccess::Allow(allow) => allow(name),
        }
    }
}
