//! Reporters: [`RunNotifier`] implementations that render a run for people or tools.
//!
//! - [`ConsoleReporter`]: pytest-style progress (`.`/`F`, or one line per case with `-v`), a failures
//!   section, and a colored summary line.
//! - [`JsonReporter`]: one JSON object per event, one event per line.

use std::io::{self, Write};

use scriptest_core::{CaseId, Cause, IdentityTree, RunNotifier, RunSummary};
use serde_json::{Value, json};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Render the identity tree as JSON (`{ "suite": .., "groups": [{ "name": .., "cases": [..] }] }`).
pub fn tree_to_json(tree: &IdentityTree) -> Value {
    let groups: Vec<Value> = tree
        .groups
        .iter()
        .map(|group| {
            json!({
                "name": group.name,
                "cases": group.cases.iter().map(|id| id.name.as_str()).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({ "suite": tree.suite, "groups": groups })
}

/// Console reporter (pytest-style).
pub struct ConsoleReporter<W: Write = io::Stderr> {
    out: W,
    verbose: bool,
    color: bool,
    failures: Vec<(CaseId, String)>,
}

impl ConsoleReporter {
    /// A colored reporter writing to stderr.
    pub fn new(verbose: bool) -> Self {
        Self {
            out: io::stderr(),
            verbose,
            color: true,
            failures: Vec::new(),
        }
    }
}

impl<W: Write> ConsoleReporter<W> {
    /// An uncolored reporter writing to `out`.
    pub fn with_writer(out: W, verbose: bool) -> Self {
        Self {
            out,
            verbose,
            color: false,
            failures: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.color {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    // A broken output stream is logged and never changes test outcomes.
    fn emit(&mut self, text: &str) {
        if let Err(err) = self.out.write_all(text.as_bytes()).and_then(|()| self.out.flush()) {
            tracing::warn!(error = %err, "cannot write console report");
        }
    }
}

fn describe(cause: &Cause) -> String {
    let mut text = format!("[{}] {}", cause.origin(), cause.message());
    if let Some(traceback) = cause.traceback() {
        text.push('\n');
        text.push_str(traceback);
    }
    text
}

impl<W: Write> RunNotifier for ConsoleReporter<W> {
    fn on_run_start(&mut self, tree: &IdentityTree) {
        let count = tree.case_count();
        if count == 0 {
            self.emit("No tests collected\n");
        } else if self.verbose {
            let line = format!("collected {count} tests in {}\n\n", tree.suite);
            self.emit(&line);
        }
    }

    fn started(&mut self, id: &CaseId) {
        if self.verbose {
            let line = format!("{id} ... ");
            self.emit(&line);
        }
    }

    fn finished(&mut self, _id: &CaseId) {
        let status = if self.verbose {
            format!("{}\n", self.paint(GREEN, "PASSED"))
        } else {
            self.paint(GREEN, ".")
        };
        self.emit(&status);
    }

    fn failed(&mut self, id: &CaseId, cause: &Cause) {
        let status = if self.verbose {
            format!("{}\n", self.paint(RED, "FAILED"))
        } else {
            self.paint(RED, "F")
        };
        self.emit(&status);
        self.failures.push((id.clone(), describe(cause)));
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        let mut text = String::new();
        if !self.verbose {
            text.push('\n');
        }

        if !self.failures.is_empty() {
            text.push_str("\n====== FAILURES ======\n");
            for (id, detail) in &self.failures {
                text.push_str(&format!("\n{}\n{detail}\n", self.paint(RED, &id.to_string())));
            }
        }

        let mut parts = Vec::new();
        if summary.passed > 0 {
            parts.push(self.paint(GREEN, &format!("{} passed", summary.passed)));
        }
        if summary.failed > 0 {
            parts.push(self.paint(RED, &format!("{} failed", summary.failed)));
        }
        if parts.is_empty() {
            parts.push(self.paint(YELLOW, "no tests ran"));
        }
        text.push_str(&format!(
            "\n====== {} in {:.2}s ======\n",
            parts.join(", "),
            summary.duration.as_secs_f64()
        ));
        self.emit(&text);
    }
}

/// Machine-readable reporter: one JSON object per line.
///
/// Events: `run_start` (with the tree), `started`, `finished`, `failed` (with `origin`, `message` and
/// `traceback`), `run_complete` (with counts). Timings are left out so output is reproducible.
pub struct JsonReporter<W: Write = io::Stdout> {
    out: W,
}

impl JsonReporter {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, event: Value) {
        if let Err(err) = writeln!(self.out, "{event}") {
            tracing::warn!(error = %err, "cannot write JSON report line");
        }
    }
}

impl<W: Write> RunNotifier for JsonReporter<W> {
    fn on_run_start(&mut self, tree: &IdentityTree) {
        self.line(json!({ "event": "run_start", "tree": tree_to_json(tree) }));
    }

    fn started(&mut self, id: &CaseId) {
        self.line(json!({ "event": "started", "group": id.group, "case": id.name }));
    }

    fn finished(&mut self, id: &CaseId) {
        self.line(json!({ "event": "finished", "group": id.group, "case": id.name }));
    }

    fn failed(&mut self, id: &CaseId, cause: &Cause) {
        self.line(json!({
            "event": "failed",
            "group": id.group,
            "case": id.name,
            "origin": cause.origin(),
            "message": cause.message(),
            "traceback": cause.traceback(),
        }));
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        self.line(json!({
            "event": "run_complete",
            "total": summary.total,
            "passed": summary.passed,
            "failed": summary.failed,
        }));
    }
}
