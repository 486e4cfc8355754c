//! Check results and the aggregate verdict.

use std::fmt;

/// What produced a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// An assertion against a resolved target.
    Assertion,
    /// A whole-run policy.
    Policy,
}

/// Result of a single assertion or policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// Human-readable name, e.g. `contains:final_response` or `policy:allowed-tools`.
    pub name: String,
    /// Assertion or policy.
    pub kind: CheckKind,
    /// Whether the check passed.
    pub passed: bool,
    /// Why it failed; empty for passing checks.
    pub detail: String,
}

impl CheckResult {
    pub(crate) fn pass(name: impl Into<String>, kind: CheckKind) -> Self {
        Self {
            name: name.into(),
            kind,
            passed: true,
            detail: String::new(),
        }
    }

    pub(crate) fn fail(
        name: impl Into<String>,
        kind: CheckKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            passed: false,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed {
            write!(f, "PASS {}", self.name)
        } else {
            write!(f, "FAIL {}: {}", self.name, self.detail)
        }
    }
}

/// Outcome of evaluating a contract against one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Scenario of the evaluated run.
    pub scenario: String,
    /// True iff every check passed.
    pub passed: bool,
    /// Every check, assertions first, in declaration order.
    pub checks: Vec<CheckResult>,
}

impl Verdict {
    /// Build a verdict from its checks.
    #[must_use]
    pub fn new(scenario: impl Into<String>, checks: Vec<CheckResult>) -> Self {
        let passed = checks.iter().all(|c| c.passed);
        Self {
            scenario: scenario.into(),
            passed,
            checks,
        }
    }

    /// Only the failed checks.
    #[must_use]
    pub fn failures(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }
}
