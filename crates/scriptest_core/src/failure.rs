//! Failure identity across the engine boundary.
//!
//! An engine reports a failing case as a [`Raised`] value. Some of those are wrappers the engine put around
//! an error that a host callback returned; the rest are genuine script-level failures. [`translate`] decides
//! which one the host should see. Getting this wrong either hides the real host error behind engine
//! noise, or turns a script assertion into a meaningless host type.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// A host-side error as carried through the engine.
pub type HostError = Arc<dyn Error + Send + Sync + 'static>;

/// Marker that separates a Lua error message from the traceback the engine appends to it.
const TRACEBACK_MARKER: &str = "\nstack traceback:";

/// A failure that originated in script code (an `error(..)` call, a syntax error, a bad argument).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub message: String,
    pub traceback: Option<String>,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: None,
        }
    }

    /// Split an engine message of the form `<message>\nstack traceback:\n...` into its parts.
    pub fn from_engine_message(raw: &str) -> Self {
        match raw.find(TRACEBACK_MARKER) {
            Some(at) => Self {
                message: raw[..at].to_string(),
                traceback: Some(raw[at + 1..].to_string()),
            },
            None => Self::new(raw),
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for ScriptError {}

/// What an engine raised, as seen from outside the engine.
#[derive(Debug, Clone)]
pub struct EngineRaised {
    /// The engine marked this error as wrapping a failure that a host callback produced.
    pub wraps_host_cause: bool,
    /// The wrapped host error, when there is one.
    pub host_cause: Option<HostError>,
    /// Script traceback at the point the host error crossed back into script code.
    pub traceback: Option<String>,
    /// The raised value itself, rendered by the engine.
    pub raw: ScriptError,
}

impl EngineRaised {
    /// A plain script-level failure.
    pub fn script(raw: ScriptError) -> Self {
        Self {
            wraps_host_cause: false,
            host_cause: None,
            traceback: None,
            raw,
        }
    }

    /// An engine wrapper around a host error.
    pub fn wrapping_host(host_cause: HostError, traceback: Option<String>, raw: ScriptError) -> Self {
        Self {
            wraps_host_cause: true,
            host_cause: Some(host_cause),
            traceback,
            raw,
        }
    }
}

/// A failure raised while invoking a test case.
#[derive(Debug, Clone)]
pub enum Raised {
    Engine(EngineRaised),
    /// A panic escaped from host code; the payload message if it had one.
    Panic(String),
}

impl From<EngineRaised> for Raised {
    fn from(value: EngineRaised) -> Self {
        Raised::Engine(value)
    }
}

/// The cause reported with a `failed` event.
#[derive(Debug, Clone)]
pub enum Cause {
    /// The unwrapped host error.
    Host {
        error: HostError,
        traceback: Option<String>,
    },
    /// A first-class script failure.
    Script(ScriptError),
    Panic(String),
}

impl Cause {
    /// The message to show for this failure.
    pub fn message(&self) -> String {
        match self {
            Cause::Host { error, .. } => error.to_string(),
            Cause::Script(err) => err.message.clone(),
            Cause::Panic(msg) => msg.clone(),
        }
    }

    /// The script traceback, when the engine captured one.
    pub fn traceback(&self) -> Option<&str> {
        match self {
            Cause::Host { traceback, .. } => traceback.as_deref(),
            Cause::Script(err) => err.traceback.as_deref(),
            Cause::Panic(_) => None,
        }
    }

    /// Short label of where the failure came from.
    pub fn origin(&self) -> &'static str {
        match self {
            Cause::Host { .. } => "host",
            Cause::Script(_) => "script",
            Cause::Panic(_) => "panic",
        }
    }

    /// Downcast a host cause to a concrete error type.
    pub fn host_error<E: Error + 'static>(&self) -> Option<&E> {
        match self {
            Cause::Host { error, .. } => error.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Host { error, .. } => write!(f, "{error}"),
            Cause::Script(err) => write!(f, "{err}"),
            Cause::Panic(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

impl Error for Cause {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Cause::Host { error, .. } => error.source(),
            _ => None,
        }
    }
}

/// Translate a raised failure into the cause the host should report.
///
/// ## Parameters
/// - `raised`: the failure exactly as the engine adapter produced it.
///
/// ## Returns
/// - (`Cause`): the unwrapped host error when the engine marked the failure as wrapping one and actually
///   carries it; otherwise the raised value as-is.
pub fn translate(raised: Raised) -> Cause {
    match raised {
        Raised::Engine(EngineRaised {
            wraps_host_cause: true,
            host_cause: Some(error),
            traceback,
            ..
        }) => Cause::Host { error, traceback },
        Raised::Engine(engine) => Cause::Script(engine.raw),
        Raised::Panic(msg) => Cause::Panic(msg),
    }
}
