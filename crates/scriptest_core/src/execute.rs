//! The sequential execution loop.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::failure::{Cause, translate};
use crate::identity::CaseId;
use crate::model::TestGroup;
use crate::notify::RunNotifier;

/// Counts for one pass over a suite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration: Duration,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Invoke every case of every group, in order, reporting each outcome to `notifier`.
///
/// ## Notes
/// - A failing or panicking case is reported and the loop moves on; nothing a case does aborts the run.
/// - Cases run one at a time on the calling thread. There is no per-case timeout: a case that never
///   returns blocks the run.
pub fn execute(groups: &[TestGroup], notifier: &mut dyn RunNotifier) -> RunSummary {
    let start = Instant::now();
    let mut summary = RunSummary::default();

    for group in groups {
        let group_name = group.display_name();
        for case in group.cases() {
            let id = CaseId::new(group_name.clone(), case.name());
            notifier.started(&id);
            summary.total += 1;

            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| case.invoke())) {
                Ok(Ok(())) => None,
                Ok(Err(raised)) => Some(translate(raised)),
                Err(payload) => Some(Cause::Panic(panic_message(payload.as_ref()))),
            };

            match outcome {
                None => {
                    summary.passed += 1;
                    notifier.finished(&id);
                }
                Some(cause) => {
                    summary.failed += 1;
                    notifier.failed(&id, &cause);
                }
            }
        }
    }

    summary.duration = start.elapsed();
    summary
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
