//! Script loading and test discovery.
//!
//! Every unit is evaluated in the suite's shared engine and must return a sequence of cases:
//!
//! ```lua
//! return tests {
//!   { "adds", function() assert(1 + 1 == 2) end },
//!   case("concats", function() assert("a" .. "b" == "ab") end),
//! }
//! ```
//!
//! Entries are `{ name = <string>, invoke = <function> }` records (what `case` builds) or positional
//! `{ <string>, <function> }` pairs. The bundled utilities (`case`, `tests`, `new_stub`, `console`) are
//! evaluated once per engine before the first unit.

use std::collections::HashSet;

use miette::Diagnostic;
use mlua::{Function, Table, Value};
use scriptest_core::{Cause, TestCase, TestGroup, translate};
use thiserror::Error;

use crate::engine::{Engine, raised_from_lua};
use crate::interop::{Interop, InteropError};
use crate::resolver::{ResolveError, SourceResolver};

/// Source of the bundled test utilities.
pub const TEST_UTILS: &str = include_str!("runtime/test_utils.lua");

const TEST_UTILS_CHUNK: &str = "scriptest/test_utils.lua";
const UTILS_LOADED_KEY: &str = "scriptest.test_utils_loaded";

#[derive(Debug, Error, Diagnostic)]
pub enum DiscoveryError {
    #[error("cannot locate test unit `{unit}`")]
    #[diagnostic(code(scriptest::discovery::missing))]
    Missing {
        unit: String,
        #[source]
        source: ResolveError,
    },

    #[error("bundled test utilities failed to load: {cause}")]
    #[diagnostic(code(scriptest::discovery::utilities))]
    Utilities { cause: Cause },

    #[error("test unit `{unit}` raised while loading: {cause}")]
    #[diagnostic(code(scriptest::discovery::evaluation))]
    Evaluation { unit: String, cause: Cause },

    #[error("test unit `{unit}` did not return a list of cases: {reason}")]
    #[diagnostic(
        code(scriptest::discovery::malformed),
        help("end the unit with `return tests {{ {{ \"name\", function() ... end }}, ... }}`")
    )]
    Malformed { unit: String, reason: String },

    #[error("test unit `{unit}` declares case `{case}` more than once")]
    #[diagnostic(code(scriptest::discovery::duplicate_case))]
    DuplicateCase { unit: String, case: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Interop(#[from] InteropError),
}

/// Evaluate `units` in order and turn each into a [`TestGroup`].
///
/// ## Parameters
/// - `engine`: the suite's engine; the utilities are evaluated into it on first use
/// - `interop`: installed before the first unit (installation is idempotent)
/// - `resolver`: maps unit names to source text
/// - `units`: unit names in declaration order
///
/// ## Returns
/// - one group per unit, in the same order, or the first error encountered
#[tracing::instrument(skip_all, fields(units = units.len()))]
pub fn discover(
    engine: &Engine,
    interop: &mut Interop,
    resolver: &dyn SourceResolver,
    units: &[String],
) -> Result<Vec<TestGroup>, DiscoveryError> {
    load_utilities(engine)?;

    let mut groups = Vec::with_capacity(units.len());
    for unit in units {
        interop.install(engine)?;

        let source = resolver.resolve(unit).map_err(|source| DiscoveryError::Missing {
            unit: unit.clone(),
            source,
        })?;
        let value = engine
            .evaluate(unit, &source)
            .map_err(|err| DiscoveryError::Evaluation {
                unit: unit.clone(),
                cause: translate(raised_from_lua(&err)),
            })?;

        let cases = interpret(unit, value)?;
        tracing::debug!(unit = %unit, cases = cases.len(), "discovered test unit");
        groups.push(TestGroup::new(unit.clone(), cases));
    }
    Ok(groups)
}

fn load_utilities(engine: &Engine) -> Result<(), DiscoveryError> {
    let utilities = |err: mlua::Error| DiscoveryError::Utilities {
        cause: translate(raised_from_lua(&err)),
    };

    let lua = engine.lua().map_err(utilities)?;
    let loaded: Option<bool> = lua.named_registry_value(UTILS_LOADED_KEY).map_err(utilities)?;
    if loaded == Some(true) {
        return Ok(());
    }

    engine.evaluate(TEST_UTILS_CHUNK, TEST_UTILS).map_err(utilities)?;
    lua.set_named_registry_value(UTILS_LOADED_KEY, true).map_err(utilities)?;
    Ok(())
}

/// Validate a unit's return value into ordered, uniquely named cases.
fn interpret(unit: &str, value: Value) -> Result<Vec<TestCase>, DiscoveryError> {
    let malformed = |reason: String| DiscoveryError::Malformed {
        unit: unit.to_string(),
        reason,
    };

    let table = match value {
        Value::Table(table) => table,
        Value::Nil => return Err(malformed("it returned nothing".to_string())),
        other => return Err(malformed(format!("it returned a value of type {}", other.type_name()))),
    };

    let len = table.raw_len();
    let mut entries = 0usize;
    table
        .for_each::<Value, Value>(|_, _| {
            entries += 1;
            Ok(())
        })
        .map_err(|err| malformed(err.to_string()))?;
    if entries != len {
        return Err(malformed("the table has keys outside of 1..n".to_string()));
    }

    let mut seen = HashSet::new();
    let mut cases = Vec::with_capacity(len);
    for index in 1..=len {
        let entry: Value = table.raw_get(index).map_err(|err| malformed(err.to_string()))?;
        let (name, body) = case_entry(index, entry).map_err(malformed)?;
        if !seen.insert(name.clone()) {
            return Err(DiscoveryError::DuplicateCase {
                unit: unit.to_string(),
                case: name,
            });
        }
        cases.push(TestCase::new(name, move || {
            body.call::<()>(()).map_err(|err| raised_from_lua(&err))
        }));
    }
    Ok(cases)
}

fn case_entry(index: usize, entry: Value) -> Result<(String, Function), String> {
    let Value::Table(record) = entry else {
        return Err(format!("entry {index} has type {}, expected a case", entry.type_name()));
    };

    let (name, body) = match field(&record, "name")? {
        Value::Nil => (field(&record, 1)?, field(&record, 2)?),
        name => (name, field(&record, "invoke")?),
    };

    match (name, body) {
        (Value::String(name), Value::Function(body)) => Ok((name.to_string_lossy().to_string(), body)),
        (Value::String(name), other) => Err(format!(
            "case `{}` has a body of type {}, expected a function",
            name.to_string_lossy(),
            other.type_name()
        )),
        (other, _) => Err(format!("entry {index} has a name of type {}, expected a string", other.type_name())),
    }
}

fn field<K: mlua::IntoLua>(record: &Table, key: K) -> Result<Value, String> {
    record.raw_get(key).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CapabilityPolicy;
    use crate::interop::Bindings;
    use crate::resolver::MemoryResolver;

    fn run_discovery(resolver: &MemoryResolver, units: &[&str]) -> Result<Vec<TestGroup>, DiscoveryError> {
        let engine = Engine::create(CapabilityPolicy::default()).unwrap();
        let mut interop = Interop::new(Bindings::new());
        let units: Vec<String> = units.iter().map(|u| u.to_string()).collect();
        discover(&engine, &mut interop, resolver, &units)
    }

    fn names(group: &TestGroup) -> Vec<&str> {
        group.cases().iter().map(|c| c.name()).collect()
    }

    #[test]
    fn test_discovers_groups_in_declared_order() {
        let resolver = MemoryResolver::new()
            .with("B.lua", "return tests { { 'b1', function() end } }")
            .with("A.lua", "return { case('a2', function() end), { 'a1', function() end } }");
        let groups = run_discovery(&resolver, &["B.lua", "A.lua"]).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].source_name(), "B.lua");
        assert_eq!(names(&groups[0]), ["b1"]);
        assert_eq!(names(&groups[1]), ["a2", "a1"]);
    }

    #[test]
    fn test_empty_sequence_is_empty_group() {
        let resolver = MemoryResolver::new().with("Empty.lua", "return {}");
        let groups = run_discovery(&resolver, &["Empty.lua"]).unwrap();
        assert!(groups[0].is_empty());
    }

    #[test]
    fn test_missing_unit() {
        let err = run_discovery(&MemoryResolver::new(), &["Nope.lua"]).unwrap_err();
        assert!(matches!(err, DiscoveryError::Missing { ref unit, .. } if unit == "Nope.lua"));
    }

    #[test]
    fn test_unit_raising_while_loading() {
        let resolver = MemoryResolver::new().with("Boom.lua", "error('cannot load')");
        match run_discovery(&resolver, &["Boom.lua"]).unwrap_err() {
            DiscoveryError::Evaluation { unit, cause } => {
                assert_eq!(unit, "Boom.lua");
                assert_eq!(cause.origin(), "script");
                assert!(cause.message().contains("cannot load"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_nil_and_scalar_results_are_malformed() {
        let resolver = MemoryResolver::new().with("Nil.lua", "local x = 1").with("Num.lua", "return 3");
        let err = run_discovery(&resolver, &["Nil.lua"]).unwrap_err();
        assert!(matches!(err, DiscoveryError::Malformed { ref reason, .. } if reason.contains("nothing")));
        let err = run_discovery(&resolver, &["Num.lua"]).unwrap_err();
        assert!(matches!(err, DiscoveryError::Malformed { ref reason, .. } if reason.contains("value of type integer")));
    }

    #[test]
    fn test_map_shaped_result_is_malformed() {
        let resolver = MemoryResolver::new().with("Map.lua", "return { first = function() end }");
        let err = run_discovery(&resolver, &["Map.lua"]).unwrap_err();
        assert!(matches!(err, DiscoveryError::Malformed { .. }));
    }

    #[test]
    fn test_entry_without_function_body_is_malformed() {
        let resolver = MemoryResolver::new().with("Bad.lua", "return { { 'no_body', 42 } }");
        match run_discovery(&resolver, &["Bad.lua"]).unwrap_err() {
            DiscoveryError::Malformed { reason, .. } => assert!(reason.contains("no_body"), "{reason}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_tests_helper_rejects_bad_entries_at_load_time() {
        let resolver = MemoryResolver::new().with("Bad.lua", "return tests { { 42, 'x' } }");
        let err = run_discovery(&resolver, &["Bad.lua"]).unwrap_err();
        assert!(matches!(err, DiscoveryError::Evaluation { .. }));
    }

    #[test]
    fn test_tests_helper_rejects_non_sequence_lists() {
        let resolver = MemoryResolver::new()
            .with("Map.lua", "return tests { first = function() end, second = function() end }")
            .with("Hole.lua", "local f = function() end return tests { { 'a', f }, nil, { 'c', f } }")
            .with("Mixed.lua", "local f = function() end return tests { { 'a', f }, extra = { 'b', f } }");

        for unit in ["Map.lua", "Hole.lua", "Mixed.lua"] {
            match run_discovery(&resolver, &[unit]).unwrap_err() {
                DiscoveryError::Evaluation { cause, .. } => {
                    assert!(cause.message().contains("expects a list of cases"), "{unit}: {cause}");
                }
                other => panic!("{unit}: unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn test_malformed_help_shows_literal_braces() {
        let err = DiscoveryError::Malformed {
            unit: "U.lua".into(),
            reason: "it returned nothing".into(),
        };
        let help = err.help().unwrap().to_string();
        assert_eq!(help, "end the unit with `return tests { { \"name\", function() ... end }, ... }`");
    }

    #[test]
    fn test_duplicate_case_names() {
        let resolver =
            MemoryResolver::new().with("Dup.lua", "return { { 'same', function() end }, { 'same', function() end } }");
        let err = run_discovery(&resolver, &["Dup.lua"]).unwrap_err();
        assert!(matches!(err, DiscoveryError::DuplicateCase { ref case, .. } if case == "same"));
    }

    #[test]
    fn test_interop_conflict_stops_discovery() {
        let engine = Engine::create(CapabilityPolicy::default()).unwrap();
        let mut interop = Interop::new(Bindings::new().helper("tests", crate::interop::RandomHelper::seeded(1)));
        let resolver = MemoryResolver::new().with("A.lua", "return {}");
        let err = discover(&engine, &mut interop, &resolver, &["A.lua".to_string()]).unwrap_err();
        assert!(matches!(err, DiscoveryError::Interop(InteropError::Conflict { .. })));
    }

    #[test]
    fn test_utilities_loaded_once_per_engine() {
        let engine = Engine::create(CapabilityPolicy::default()).unwrap();
        let mut interop = Interop::new(Bindings::new());
        let resolver = MemoryResolver::new().with("Mark.lua", "tests_marker = tests; return {}");
        discover(&engine, &mut interop, &resolver, &["Mark.lua".to_string()]).unwrap();
        discover(&engine, &mut interop, &MemoryResolver::new(), &[]).unwrap();

        let same = engine.evaluate("check.lua", "return tests_marker == tests").unwrap();
        assert_eq!(same.as_boolean(), Some(true));
    }

    #[test]
    fn test_stub_records_calls() {
        let engine = Engine::create(CapabilityPolicy::default()).unwrap();
        load_utilities(&engine).unwrap();
        let value = engine
            .evaluate(
                "stub.lua",
                r#"
                local stub = new_stub()
                stub:importantFunction("hello", "world")
                stub.plain(1)
                return stub:called("importantFunction", "hello", "world")
                    and not stub:called("importantFunction", "wrong", "args")
                    and stub:called("plain", 1)
                    and #stub.calls == 2
                "#,
            )
            .unwrap();
        assert_eq!(value.as_boolean(), Some(true));
    }

    #[test]
    fn test_discovered_case_invokes_script_function() {
        let resolver = MemoryResolver::new().with(
            "Count.lua",
            "counter = 0; return { { 'bump', function() counter = counter + 1 end } }",
        );
        let engine = Engine::create(CapabilityPolicy::default()).unwrap();
        let mut interop = Interop::new(Bindings::new());
        let groups = discover(&engine, &mut interop, &resolver, &["Count.lua".to_string()]).unwrap();

        groups[0].cases()[0].invoke().unwrap();
        groups[0].cases()[0].invoke().unwrap();
        assert_eq!(engine.evaluate("check.lua", "return counter").unwrap().as_i64(), Some(2));
    }
}
