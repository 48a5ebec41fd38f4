//! Automated content checks.
//!
//! Checkers are pluggable validators run against the rendered artifacts of
//! a submission. Each checker declares which probe forms it supports; the
//! runner invokes the most specific supported form for which an artifact
//! exists, exactly once per checker, and records the outcome.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::store::Store;
use crate::store::models::{Submission, SubmissionCheck};

/// Probe forms, in invocation priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Probe {
    XmlFragment,
    XmlFile,
    TxtFragment,
    TxtFile,
}

pub const PROBE_ORDER: [Probe; 4] = [
    Probe::XmlFragment,
    Probe::XmlFile,
    Probe::TxtFragment,
    Probe::TxtFile,
];

impl Probe {
    /// Artifact extension this probe consumes.
    pub fn extension(self) -> &'static str {
        match self {
            Probe::XmlFragment | Probe::XmlFile => "xml",
            Probe::TxtFragment | Probe::TxtFile => "txt",
        }
    }
}

/// Outcome of a single checker invocation.
#[derive(Clone, Debug, Serialize)]
pub struct CheckResult {
    /// `None` when the checker could not reach a verdict.
    pub passed: Option<bool>,
    pub message: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub info: serde_json::Value,
}

impl CheckResult {
    pub fn passed(message: &str) -> CheckResult {
        CheckResult {
            passed: Some(true),
            message: message.to_string(),
            errors: Vec::new(),
            warnings: Vec::new(),
            info: serde_json::Value::Null,
        }
    }

    pub fn failed(message: &str, errors: Vec<String>) -> CheckResult {
        CheckResult {
            passed: Some(false),
            message: message.to_string(),
            errors,
            warnings: Vec::new(),
            info: serde_json::Value::Null,
        }
    }
}

/// A pluggable content checker.
///
/// Instead of exposing an irregular subset of probe methods, a checker
/// declares which probe forms it supports and receives the chosen one as an
/// argument.
pub trait Checker {
    fn name(&self) -> &str;
    fn symbol(&self) -> &str;
    fn supports(&self, probe: Probe) -> bool;
    fn check(&self, probe: Probe, path: &Path) -> CheckResult;
}

/// Run one checker against the available artifacts.
///
/// Returns `None` when the checker supports no probe for which an artifact
/// exists; in that case nothing is recorded.
pub fn apply_checker(
    checker: &dyn Checker,
    submission: &Submission,
    files: &BTreeMap<String, PathBuf>,
) -> Option<SubmissionCheck> {
    for &probe in &PROBE_ORDER {
        if !checker.supports(probe) {
            continue;
        }
        let path = match files.get(probe.extension()) {
            Some(path) => path,
            None => continue,
        };

        let result = checker.check(probe, path);
        return Some(SubmissionCheck {
            submission: submission.id,
            checker: checker.name().to_string(),
            symbol: checker.symbol().to_string(),
            passed: result.passed,
            message: result.message,
            errors: result.errors,
            warnings: result.warnings,
            items: result.info,
        });
    }

    None
}

/// Run all checkers and persist one check record per checker invoked.
pub fn apply_checkers(
    store: &Store,
    checkers: &[Box<dyn Checker>],
    submission: &Submission,
    files: &BTreeMap<String, PathBuf>,
) -> crate::Result<()> {
    let mark = Instant::now();
    let mut results = Vec::new();

    for checker in checkers {
        let lap = Instant::now();
        if let Some(check) = apply_checker(checker.as_ref(), submission, files) {
            results.push(check);
        }
        info!("ran {} ({:.3}s) for {}-{}",
            checker.name(), lap.elapsed().as_secs_f64(),
            submission.name, submission.rev);
    }

    info!("ran submission checks ({:.3}s) for {}-{}",
        mark.elapsed().as_secs_f64(), submission.name, submission.rev);

    store.transaction(|state| {
        for check in results {
            state.record_check(check);
        }
        Ok(())
    })
}

/// Messages of checks that explicitly failed. Unknown verdicts never block.
pub fn failed_check_messages(store: &Store, submission: i32) -> Vec<String> {
    store.with(|state| {
        state.checks_for(submission)
            .into_iter()
            .filter(|c| c.passed == Some(false))
            .map(|c| c.message.clone())
            .collect()
    })
}
