//! Push side of the host reporting protocol.
//!
//! Implement [`RunNotifier`] to receive case events (console output, JSON lines, a recording log in
//! tests). Events for one case always arrive as `started` followed by exactly one of `finished` or
//! `failed`; cases arrive in identity-tree order.

use crate::execute::RunSummary;
use crate::failure::Cause;
use crate::identity::{CaseId, IdentityTree};

pub trait RunNotifier {
    /// Called once before the first case, with the tree about to be executed.
    fn on_run_start(&mut self, _tree: &IdentityTree) {}

    /// A case is about to be invoked.
    fn started(&mut self, id: &CaseId);

    /// A case returned normally.
    fn finished(&mut self, id: &CaseId);

    /// A case raised; `cause` is already translated.
    fn failed(&mut self, id: &CaseId, cause: &Cause);

    /// Called once after every case has run.
    fn on_run_complete(&mut self, _summary: &RunSummary) {}
}

impl<N: RunNotifier + ?Sized> RunNotifier for &mut N {
    fn on_run_start(&mut self, tree: &IdentityTree) {
        (**self).on_run_start(tree);
    }

    fn started(&mut self, id: &CaseId) {
        (**self).started(id);
    }

    fn finished(&mut self, id: &CaseId) {
        (**self).finished(id);
    }

    fn failed(&mut self, id: &CaseId, cause: &Cause) {
        (**self).failed(id, cause);
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        (**self).on_run_complete(summary);
    }
}
