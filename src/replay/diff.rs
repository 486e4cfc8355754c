//! Turn-by-turn comparison of a replayed run against its recording.

use crate::trajectory::{Run, Turn};

/// Outcome of comparing replayed behavior with the recording.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Tool calls that matched function and arguments.
    pub matched_tools: usize,
    /// Tool calls that differed, were missing, or were extra.
    pub mismatched_tools: usize,
    /// Recorded tool calls that did not happen.
    pub missing_tools: usize,
    /// Tool calls that were not recorded.
    pub extra_tools: usize,
    /// Human-readable divergence descriptions.
    pub errors: Vec<String>,
}

impl ReplayReport {
    /// True when nothing diverged.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.errors.is_empty() && self.mismatched_tools == 0
    }
}

/// Compare `actual` against `recorded`, turn by turn.
#[must_use]
pub fn diff_runs(recorded: &Run, actual: &Run) -> ReplayReport {
    let mut report = ReplayReport::default();
    let expected_turns = recorded.turns();
    let actual_turns = actual.turns();

    for (i, turn) in actual_turns.iter().enumerate() {
        match expected_turns.get(i) {
            Some(expected) => compare_turn(&mut report, i, expected, turn),
            None => {
                let extra = turn.tool_calls.len();
                report.extra_tools += extra;
                report.mismatched_tools += extra;
                report.errors.push(format!(
                    "Extra turn {i}: role={}, content={}",
                    turn.role,
                    preview(&turn.content)
                ));
            }
        }
    }

    if actual_turns.len() < expected_turns.len() {
        let missing_turns = &expected_turns[actual_turns.len()..];
        let missing_calls: usize = missing_turns.iter().map(|t| t.tool_calls.len()).sum();
        report.missing_tools += missing_calls;
        report.mismatched_tools += missing_calls;
        report.errors.push(format!(
            "Missing {} turns (recorded {}, got {})",
            missing_turns.len(),
            expected_turns.len(),
            actual_turns.len()
        ));
    }

    report
}

fn compare_turn(report: &mut ReplayReport, i: usize, expected: &Turn, actual: &Turn) {
    if expected.role != actual.role {
        let (want, got) = (&expected.role, &actual.role);
        let message = format!("Turn {i}: expected role={want}, got role={got}");
        report.errors.push(message);
    }

    let (want, got) = (expected.tool_calls.len(), actual.tool_calls.len());
    if want != got {
        if got > want {
            report.extra_tools += got - want;
        } else {
            report.missing_tools += want - got;
        }
        report.mismatched_tools += want.abs_diff(got);
        let message = format!("Turn {i}: expected {want} tool calls, got {got}");
        report.errors.push(message);
        return;
    }

    let pairs = expected.tool_calls.iter().zip(&actual.tool_calls);
    for (j, (exp, act)) in pairs.enumerate() {
        if exp.function != act.function {
            report.mismatched_tools += 1;
            report.errors.push(format!(
                "Turn {i}, tool {j}: expected function='{}', got function='{}'",
                exp.function, act.function
            ));
        } else if exp.arguments != act.arguments {
            report.mismatched_tools += 1;
            let message = format!("Turn {i}, tool {j} ({}): arguments differ", act.function);
            report.errors.push(message);
        } else {
            report.matched_tools += 1;
        }
    }
}

fn preview(content: &str) -> String {
    if content.is_empty() {
        return "(none)".to_string();
    }
    let head: String = content.chars().take(50).collect();
    if head.len() < content.len() {
        format!("{head}...")
    } else {
        head
    }
}
