//! Identity mapping: the two-level naming hierarchy (group → case) the host reports against.

use std::borrow::Cow;
use std::fmt;

use crate::model::TestGroup;

/// Derive the reporting name of a group from its source unit name.
///
/// ## Parameters
/// - `source_name`: the unit name as declared (e.g. `ExampleTestOne.lua`).
///
/// ## Returns
/// - (`Cow<str>`): `B.A` when `source_name` is exactly `A.B` (one `.`), otherwise `source_name` unchanged.
///
/// ## Notes
/// - Mirrors legacy `package.Class` reporting, where the trailing segment comes first.
/// - Names with zero or several dots pass through untouched; the rule is not generalized.
///
/// ## Examples
/// ```rust
/// use scriptest_core::display_name;
/// assert_eq!(display_name("pkg.Name"), "Name.pkg");
/// assert_eq!(display_name("a.b.c"), "a.b.c");
/// assert_eq!(display_name("plain"), "plain");
/// ```
pub fn display_name(source_name: &str) -> Cow<'_, str> {
    let mut parts = source_name.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(head), Some(tail), None) => Cow::Owned(format!("{tail}.{head}")),
        _ => Cow::Borrowed(source_name),
    }
}

/// Address of one test case in the identity tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaseId {
    /// Display name of the owning group.
    pub group: String,
    /// Case name, unmodified.
    pub name: String,
}

impl CaseId {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.group, self.name)
    }
}

/// One top-level node: a group and its cases in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupIdentity {
    pub name: String,
    pub cases: Vec<CaseId>,
}

/// The full identity tree of a suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityTree {
    pub suite: String,
    pub groups: Vec<GroupIdentity>,
}

impl IdentityTree {
    /// Total number of case identities.
    pub fn case_count(&self) -> usize {
        self.groups.iter().map(|g| g.cases.len()).sum()
    }

    /// Every case identity, flattened in execution order.
    pub fn case_ids(&self) -> impl Iterator<Item = &CaseId> {
        self.groups.iter().flat_map(|g| g.cases.iter())
    }
}

impl fmt::Display for IdentityTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.suite)?;
        for group in &self.groups {
            writeln!(f, "  {}", group.name)?;
            for case in &group.cases {
                writeln!(f, "    {}", case.name)?;
            }
        }
        Ok(())
    }
}

/// Build the identity tree for `groups`.
///
/// Pure: callable before, instead of, or after execution, and always yields the same tree for the same
/// groups. Group order and case order are carried over unchanged.
pub fn build_tree(suite: &str, groups: &[TestGroup]) -> IdentityTree {
    let groups = groups
        .iter()
        .map(|group| {
            let name = group.display_name();
            let cases = group
                .cases()
                .iter()
                .map(|case| CaseId::new(name.clone(), case.name()))
                .collect();
            GroupIdentity { name, cases }
        })
        .collect();

    IdentityTree {
        suite: suite.to_string(),
        groups,
    }
}
