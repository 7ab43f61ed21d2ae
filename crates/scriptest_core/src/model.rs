//! Discovered test records.
//!
//! A unit of script source produces one [`TestGroup`]; each entry the unit returned becomes a [`TestCase`].
//! Both are read-only once discovery hands them over.

use std::fmt;

use crate::failure::Raised;
use crate::identity;

/// The callable body of a test case.
///
/// Returning `Err` means the case raised; panics are caught by the execution loop.
pub type Invoke = Box<dyn Fn() -> Result<(), Raised>>;

/// A single named, invokable unit of test logic.
pub struct TestCase {
    name: String,
    invoke: Invoke,
}

impl TestCase {
    /// Create a case from its name and body.
    pub fn new(name: impl Into<String>, invoke: impl Fn() -> Result<(), Raised> + 'static) -> Self {
        Self {
            name: name.into(),
            invoke: Box::new(invoke),
        }
    }

    /// The case name exactly as the script declared it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the case body once.
    pub fn invoke(&self) -> Result<(), Raised> {
        (self.invoke)()
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase").field("name", &self.name).finish_non_exhaustive()
    }
}

/// The cases discovered from one named source unit, in the order the unit returned them.
#[derive(Debug)]
pub struct TestGroup {
    source_name: String,
    cases: Vec<TestCase>,
}

impl TestGroup {
    pub fn new(source_name: impl Into<String>, cases: Vec<TestCase>) -> Self {
        Self {
            source_name: source_name.into(),
            cases,
        }
    }

    /// The unit name this group was loaded from (e.g. `ExampleTestOne.lua`).
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// The name the identity tree uses for this group. See [`identity::display_name`].
    pub fn display_name(&self) -> String {
        identity::display_name(&self.source_name).into_owned()
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Keep only the cases matching `keep`, preserving their relative order.
    pub fn retain(&mut self, mut keep: impl FnMut(&TestCase) -> bool) {
        self.cases.retain(|case| keep(case));
    }
}
