//! Conformance checks
//!
//! A module may carry `assert_return`-style checks: pairs of expressions
//! whose results must match by exact bit pattern. Running them accumulates
//! a summary instead of stopping at the first failure, so one run reports
//! every divergence.

use super::interp::Runtime;
use super::value::Value;

/// Pass/fail tally from [`Runtime::run_asserts`].
#[derive(Debug, Default)]
pub struct AssertSummary {
    pub passed: usize,
    pub failed: usize,
    /// One line per failure: the check's message and what went wrong.
    pub failures: Vec<String>,
}

impl AssertSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    fn pass(&mut self) {
        self.passed += 1;
    }

    fn fail(&mut self, message: String) {
        self.failed += 1;
        self.failures.push(message);
    }
}

fn describe(value: &Option<Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "void".to_string(),
    }
}

impl Runtime {
    /// Evaluate every carried check. A trap on either side is a failure,
    /// not an abort.
    pub fn run_asserts(&mut self) -> AssertSummary {
        let module = self.module();
        let mut summary = AssertSummary::default();
        for check in &module.asserts {
            let actual = match self.eval_expr(&check.actual) {
                Ok(v) => v,
                Err(err) => {
                    summary.fail(format!("{}: actual trapped: {}", check.message, err));
                    continue;
                }
            };
            let expected = match self.eval_expr(&check.expected) {
                Ok(v) => v,
                Err(err) => {
                    summary.fail(format!("{}: expected trapped: {}", check.message, err));
                    continue;
                }
            };
            let matched = match (&actual, &expected) {
                (Some(a), Some(e)) => a.bits_eq(e),
                (None, None) => true,
                _ => false,
            };
            if matched {
                summary.pass();
            } else {
                summary.fail(format!(
                    "{}: got {}, want {}",
                    check.message,
                    describe(&actual),
                    describe(&expected)
                ));
            }
        }
        summary
    }
}
