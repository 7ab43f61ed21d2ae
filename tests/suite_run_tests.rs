//! End-to-end runs of fixture suites through `SuiteBuilder` / `Suite::run`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use mlua::{Lua, UserData, Value};

use scriptest::interop::{HelperError, HostAccessError, LoadError};
use scriptest::manifest::{RANDOM_GLOBAL, RANDOM_HOST_TYPE};
use scriptest::{
    Bindings, CapabilityPolicy, CaseId, Cause, DiscoveryError, HostObject, IdentityTree, MemoryResolver,
    RandomHelper, RunNotifier, RunSummary, Suite, SuiteBuilder, SuiteError,
};

fn scripts() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/scripts")
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    RunStart(usize),
    Started(String),
    Finished(String),
    Failed(String, &'static str, String),
    RunComplete(usize, usize),
}

#[derive(Default)]
struct Recorder {
    events: Vec<Event>,
    causes: Vec<(CaseId, Cause)>,
}

impl RunNotifier for Recorder {
    fn on_run_start(&mut self, tree: &IdentityTree) {
        self.events.push(Event::RunStart(tree.case_count()));
    }

    fn started(&mut self, id: &CaseId) {
        self.events.push(Event::Started(id.to_string()));
    }

    fn finished(&mut self, id: &CaseId) {
        self.events.push(Event::Finished(id.to_string()));
    }

    fn failed(&mut self, id: &CaseId, cause: &Cause) {
        self.events
            .push(Event::Failed(id.to_string(), cause.origin(), cause.message()));
        self.causes.push((id.clone(), cause.clone()));
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        self.events.push(Event::RunComplete(summary.passed, summary.failed));
    }
}

impl Recorder {
    fn cause(&self, case: &str) -> &Cause {
        self.causes
            .iter()
            .find(|(id, _)| id.name == case)
            .map(|(_, cause)| cause)
            .unwrap_or_else(|| panic!("no failure recorded for {case}"))
    }
}

/// Installs one userdata per engine; it is dropped only when the Lua state closes.
struct ClosedEngines(Arc<AtomicUsize>);

struct Sentinel(Arc<AtomicUsize>);

impl UserData for Sentinel {}

impl Drop for Sentinel {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl HostObject for ClosedEngines {
    fn to_lua(&self, lua: &Lua) -> mlua::Result<Value> {
        lua.create_userdata(Sentinel(Arc::clone(&self.0))).map(Value::UserData)
    }
}

fn tracked_builder(closed: &Arc<AtomicUsize>, unit: &str) -> SuiteBuilder {
    let resolver = MemoryResolver::new().with(
        "Tracked.lua",
        "return tests { { 'ok', function() end }, { 'also_ok', function() end } }",
    );
    SuiteBuilder::new("Tracked")
        .bindings(Bindings::new().helper("sentinel", ClosedEngines(Arc::clone(closed))))
        .resolver(resolver)
        .unit(unit)
}

fn host_failures_suite(policy: CapabilityPolicy) -> Suite {
    let random = RandomHelper::seeded(11);
    SuiteBuilder::new("HostFailures")
        .policy(policy)
        .bindings(
            Bindings::new()
                .helper(RANDOM_GLOBAL, random.clone())
                .host_type(RANDOM_HOST_TYPE, random),
        )
        .root(scripts())
        .unit("HostFailures.lua")
        .build()
        .unwrap()
}

#[test]
fn test_two_unit_scenario() {
    let suite = SuiteBuilder::new("Scenario")
        .root(scripts())
        .units(["A.lua", "B.lua"])
        .build()
        .unwrap();

    insta::assert_snapshot!(suite.description().to_string(), @r"
    Scenario
      lua.A
        t1
        t2
      lua.B
        t3
    ");

    let mut recorder = Recorder::default();
    let report = suite.run(&mut recorder);

    assert_eq!(
        recorder.events,
        [
            Event::RunStart(3),
            Event::Started("lua.A::t1".into()),
            Event::Finished("lua.A::t1".into()),
            Event::Started("lua.A::t2".into()),
            Event::Failed("lua.A::t2".into(), "script", "A.lua:4: t2 always fails".into()),
            Event::Started("lua.B::t3".into()),
            Event::Finished("lua.B::t3".into()),
            Event::RunComplete(2, 1),
        ]
    );
    assert_eq!(report.summary.total, 3);
    assert!(report.teardown.is_ok());
    assert!(!report.is_success());
}

#[test]
fn test_script_failure_keeps_traceback() {
    let suite = SuiteBuilder::new("S").root(scripts()).unit("A.lua").build().unwrap();
    let mut recorder = Recorder::default();
    suite.run(&mut recorder);

    match recorder.cause("t2") {
        Cause::Script(err) => {
            assert_eq!(err.message, "A.lua:4: t2 always fails");
            let traceback = err.traceback.as_deref().unwrap();
            assert!(traceback.starts_with("stack traceback:"), "{traceback}");
        }
        other => panic!("expected a script cause, got {other:?}"),
    }
}

#[test]
fn test_example_suite_passes() {
    let suite = SuiteBuilder::new("ExampleTestSuite")
        .root(scripts())
        .units(["ExampleTestOne.lua", "TestFileUnderTest.lua"])
        .build()
        .unwrap();

    let tree = suite.description();
    assert_eq!(
        tree.groups.iter().map(|g| g.name.as_str()).collect::<Vec<_>>(),
        ["lua.ExampleTestOne", "lua.TestFileUnderTest"]
    );

    let mut recorder = Recorder::default();
    let report = suite.run(&mut recorder);
    assert!(report.is_success(), "{:?}", recorder.events);
    assert_eq!(report.summary.passed, 5);
}

#[test]
fn test_root_is_load_root_whatever_the_call_order() {
    let suite = SuiteBuilder::new("RootFirst")
        .root(scripts())
        .bindings(Bindings::new().helper(RANDOM_GLOBAL, RandomHelper::seeded(5)))
        .unit("TestFileUnderTest.lua")
        .build()
        .unwrap();

    let mut recorder = Recorder::default();
    let report = suite.run(&mut recorder);
    assert!(report.is_success(), "{:?}", recorder.events);
}

#[test]
fn test_host_failures_are_unwrapped() {
    let suite = host_failures_suite(CapabilityPolicy::default().allow_prefixes(vec!["scriptest.".into()]));
    let mut recorder = Recorder::default();
    let report = suite.run(&mut recorder);

    assert_eq!(report.summary.total, 5);
    assert_eq!(report.summary.passed, 1);

    let helper = recorder.cause("helper_rejects_bound");
    assert_eq!(helper.origin(), "host");
    assert!(matches!(
        helper.host_error::<HelperError>(),
        Some(HelperError::InvalidArgument { method: "random_int", .. })
    ));

    let load = recorder.cause("include_missing_file").host_error::<LoadError>().unwrap();
    assert_eq!(load.path, "../shared/does_not_exist.lua");

    assert_eq!(
        recorder.cause("denied_host_type").host_error::<HostAccessError>(),
        Some(&HostAccessError::Denied {
            name: "system.Clock".into()
        })
    );

    let script = recorder.cause("script_error_after_helper");
    assert_eq!(script.origin(), "script");
    assert!(script.message().ends_with("script failure after drawing number"));
}

#[test]
fn test_unknown_host_type_under_open_policy() {
    let suite = host_failures_suite(CapabilityPolicy::default());
    let mut recorder = Recorder::default();
    suite.run(&mut recorder);

    assert!(matches!(
        recorder.cause("denied_host_type").host_error::<HostAccessError>(),
        Some(HostAccessError::Unknown { .. })
    ));
}

#[test]
fn test_panicking_notifier_does_not_leak_engine() {
    struct Exploding;

    impl RunNotifier for Exploding {
        fn started(&mut self, _id: &CaseId) {
            panic!("notifier exploded");
        }
        fn finished(&mut self, _id: &CaseId) {}
        fn failed(&mut self, _id: &CaseId, _cause: &Cause) {}
    }

    let closed = Arc::new(AtomicUsize::new(0));
    let suite = tracked_builder(&closed, "Tracked.lua").build().unwrap();
    assert_eq!(closed.load(Ordering::SeqCst), 0);

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| suite.run(&mut Exploding)));
    assert!(outcome.is_err());
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_engine_closes_once_after_run() {
    let closed = Arc::new(AtomicUsize::new(0));
    let suite = tracked_builder(&closed, "Tracked.lua").build().unwrap();

    let report = suite.run(&mut Recorder::default());
    assert!(report.is_success());
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_engine_closes_once_after_failed_build() {
    let closed = Arc::new(AtomicUsize::new(0));
    let err = tracked_builder(&closed, "Absent.lua").build().err().unwrap();

    assert!(matches!(err, SuiteError::Discovery(DiscoveryError::Missing { .. })));
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_filter_keeps_order_and_drops_empty_groups() {
    let mut suite = SuiteBuilder::new("S")
        .root(scripts())
        .units(["A.lua", "B.lua", "ExampleTestOne.lua"])
        .build()
        .unwrap();

    suite.filter(|group, case| group != "lua.A" && case.name() != "adds_numbers").unwrap();
    insta::assert_snapshot!(suite.description().to_string(), @r"
    S
      lua.B
        t3
      lua.ExampleTestOne
        concatenates_strings
        logs_to_console
    ");

    let err = suite.filter(|_, _| false).unwrap_err();
    assert_eq!(err.suite, "S");
}

#[test]
fn test_sort_keeps_discovery_order() {
    let mut suite = SuiteBuilder::new("S").root(scripts()).units(["B.lua", "A.lua"]).build().unwrap();
    let before = suite.description();
    suite.sort(|a, b| a.name().cmp(b.name()));
    assert_eq!(suite.description(), before);
}

#[test]
fn test_discovery_failures_surface_as_suite_errors() {
    let broken = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/broken");
    let build = |unit: &str| SuiteBuilder::new("Broken").root(&broken).unit(unit).build();

    assert!(matches!(
        build("NotATable.lua").err().unwrap(),
        SuiteError::Discovery(DiscoveryError::Malformed { .. })
    ));
    assert!(matches!(
        build("RaisesOnLoad.lua").err().unwrap(),
        SuiteError::Discovery(DiscoveryError::Evaluation { .. })
    ));
    assert!(matches!(
        build("Duplicates.lua").err().unwrap(),
        SuiteError::Discovery(DiscoveryError::DuplicateCase { .. })
    ));
    assert!(matches!(
        build("Absent.lua").err().unwrap(),
        SuiteError::Discovery(DiscoveryError::Missing { .. })
    ));
}

#[test]
fn test_in_memory_suite_with_restricted_policy() {
    let resolver = MemoryResolver::new().with(
        "Sandboxed.lua",
        r#"
        return tests {
          { "no_io", function() assert(io == nil and os == nil) end },
          { "math_ok", function() assert(math.max(1, 2) == 2) end },
        }
        "#,
    );
    let suite = SuiteBuilder::new("Sandboxed")
        .resolver(resolver)
        .policy(CapabilityPolicy::restricted(|_| false))
        .unit("Sandboxed.lua")
        .build()
        .unwrap();

    let report = suite.run(&mut Recorder::default());
    assert!(report.is_success());
}

#[test]
fn test_memory_limit_failure_is_isolated() {
    let resolver = MemoryResolver::new().with(
        "Hog.lua",
        r#"
        return tests {
          { "hog", function() local t = {} for i = 1, 1e8 do t[i] = i end end },
          { "after", function() assert(true) end },
        }
        "#,
    );
    let suite = SuiteBuilder::new("Hog")
        .resolver(resolver)
        .policy(CapabilityPolicy::default().with_memory_limit(2 * 1024 * 1024))
        .unit("Hog.lua")
        .build()
        .unwrap();

    let mut recorder = Recorder::default();
    let report = suite.run(&mut recorder);
    assert_eq!((report.summary.passed, report.summary.failed), (1, 1));
    assert_eq!(recorder.cause("hog").origin(), "script");
}
