//! Whole-run policies: tool allowlists and confirmation gates.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::verdict::{CheckKind, CheckResult};
use super::SpecError;
use crate::trajectory::{Role, Run};

/// Declared form of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySpec {
    /// Policy name, used in check names.
    #[serde(default)]
    pub name: String,
    /// Policy type, e.g. `tool_allowlist`.
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Tools the policy applies to.
    #[serde(default)]
    pub tools: Vec<String>,
}

impl PolicySpec {
    /// Convenience constructor.
    pub fn new<I, S>(name: &str, kind: &str, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: kind.into(),
            tools: tools.into_iter().map(Into::into).collect(),
        }
    }
}

/// One offending tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Id of the call.
    pub call_id: String,
    /// Function called.
    pub function: String,
    /// Turn carrying the call.
    pub turn_index: usize,
}

/// A compiled policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    /// Only the listed tools may be called.
    ToolAllowlist {
        /// Policy name.
        name: String,
        /// Allowed tools.
        tools: BTreeSet<String>,
    },
    /// Each call to a listed tool needs a fresh user turn before it.
    RequiresConfirmation {
        /// Policy name.
        name: String,
        /// Protected tools.
        tools: BTreeSet<String>,
    },
}

impl Policy {
    /// Validate and compile a declared policy.
    ///
    /// # Errors
    ///
    /// [`SpecError::InvalidPolicySpec`] on a missing name, a missing type or
    /// an unknown type.
    pub fn compile(spec: &PolicySpec) -> Result<Self, SpecError> {
        let invalid = |message: String| Err(SpecError::InvalidPolicySpec(message));
        if spec.name.trim().is_empty() {
            return invalid(format!("{}: missing 'name'", spec.kind));
        }
        if spec.kind.trim().is_empty() {
            return invalid(format!("{}: missing 'type'", spec.name));
        }
        let name = spec.name.clone();
        let tools = spec.tools.iter().cloned().collect();
        match spec.kind.as_str() {
            "tool_allowlist" => Ok(Self::ToolAllowlist { name, tools }),
            "requires_confirmation" => Ok(Self::RequiresConfirmation { name, tools }),
            other => invalid(format!("{name}: unknown policy type '{other}'")),
        }
    }

    /// Policy name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::ToolAllowlist { name, .. } | Self::RequiresConfirmation { name, .. } => name,
        }
    }

    /// Every call that breaks the policy, in run order.
    #[must_use]
    pub fn violations(&self, run: &Run) -> Vec<Violation> {
        match self {
            Self::ToolAllowlist { tools, .. } => run
                .tool_calls()
                .filter(|(_, call)| !tools.contains(&call.function))
                .map(|(turn_index, call)| Violation {
                    call_id: call.id.clone(),
                    function: call.function.clone(),
                    turn_index,
                })
                .collect(),
            Self::RequiresConfirmation { tools, .. } => unconfirmed(run, tools),
        }
    }

    /// One passing check, or one failing check per violation.
    #[must_use]
    pub fn evaluate(&self, run: &Run) -> Vec<CheckResult> {
        let name = format!("policy:{}", self.name());
        let violations = self.violations(run);
        if violations.is_empty() {
            tracing::debug!(check = %name, "policy held");
            return vec![CheckResult::pass(name, CheckKind::Policy)];
        }
        tracing::debug!(check = %name, violations = violations.len(), "policy violated");
        violations
            .iter()
            .map(|v| CheckResult::fail(name.clone(), CheckKind::Policy, self.describe(v)))
            .collect()
    }

    fn describe(&self, v: &Violation) -> String {
        let call = format!("tool '{}' (call {})", v.function, v.call_id);
        match self {
            Self::ToolAllowlist { .. } => {
                format!("{call} at turn {} is not in the allowlist", v.turn_index)
            }
            Self::RequiresConfirmation { .. } => format!(
                "{call} at turn {} was not preceded by a user confirmation",
                v.turn_index
            ),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, tools) = match self {
            Self::ToolAllowlist { tools, .. } => ("tool_allowlist", tools),
            Self::RequiresConfirmation { tools, .. } => ("requires_confirmation", tools),
        };
        let tools: Vec<&str> = tools.iter().map(String::as_str).collect();
        write!(f, "{} ({kind}: {})", self.name(), tools.join(", "))
    }
}

/// Protected calls with no user turn since the previous protected call.
fn unconfirmed(run: &Run, tools: &BTreeSet<String>) -> Vec<Violation> {
    let turns = run.turns();
    let mut lower = 0;
    let mut violations = Vec::new();
    for (turn_index, call) in run.tool_calls() {
        if !tools.contains(&call.function) {
            continue;
        }
        let since = turns.get(lower..turn_index).unwrap_or_default();
        let confirmed = since.iter().any(|t| t.role == Role::User);
        if !confirmed {
            violations.push(Violation {
                call_id: call.id.clone(),
                function: call.function.clone(),
                turn_index,
            });
        }
        lower = turn_index + 1;
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::{ToolCall, TurnDraft};
    use serde_json::Map;

    fn call(id: &str, function: &str) -> ToolCall {
        ToolCall::new(id, function, Map::new())
    }

    fn calls(function: &str, ids: &[&str]) -> TurnDraft {
        let mut draft = TurnDraft::assistant("");
        for id in ids {
            draft = draft.with_tool_call(call(id, function));
        }
        draft
    }

    fn policy(name: &str, kind: &str, tools: &[&str]) -> Policy {
        let spec = PolicySpec::new(name, kind, tools.iter().copied());
        Policy::compile(&spec).unwrap()
    }

    fn allowlist(tools: &[&str]) -> Policy {
        policy("allowed", "tool_allowlist", tools)
    }

    fn gate(tools: &[&str]) -> Policy {
        policy("confirm", "requires_confirmation", tools)
    }

    fn violation(call_id: &str, function: &str, turn_index: usize) -> Violation {
        Violation {
            call_id: call_id.into(),
            function: function.into(),
            turn_index,
        }
    }

    #[test]
    fn allowlist_reports_each_offending_call() {
        let mut run = Run::new("allowlist");
        run.push_turn(TurnDraft::user("hi")).unwrap();
        let mixed = TurnDraft::assistant("")
            .with_tool_call(call("1", "lookup_order"))
            .with_tool_call(call("2", "delete_account"));
        run.push_turn(mixed).unwrap();
        run.push_turn(calls("send_email", &["3"])).unwrap();

        let violations = allowlist(&["lookup_order"]).violations(&run);
        let expected = vec![
            violation("2", "delete_account", 1),
            violation("3", "send_email", 2),
        ];
        assert_eq!(violations, expected);

        let checks = allowlist(&["lookup_order"]).evaluate(&run);
        assert_eq!(checks.len(), 2);
        assert!(checks.iter().all(|c| !c.passed));
        assert!(checks.iter().all(|c| c.name == "policy:allowed"));

        let everything = ["lookup_order", "delete_account", "send_email"];
        let checks = allowlist(&everything).evaluate(&run);
        assert_eq!(checks.len(), 1);
        assert!(checks[0].passed);
    }

    #[test]
    fn allowlist_passes_run_without_calls() {
        let mut run = Run::new("quiet");
        let quiet = TurnDraft::assistant("nothing to do");
        run.push_turn(quiet).unwrap();
        assert!(allowlist(&[]).violations(&run).is_empty());
    }

    #[test]
    fn confirmation_needs_prior_user_turn() {
        let mut ok = Run::new("confirmed");
        ok.push_turn(TurnDraft::user("yes, refund it")).unwrap();
        ok.push_turn(calls("process_refund", &["1"])).unwrap();
        assert!(gate(&["process_refund"]).violations(&ok).is_empty());

        let mut bad = Run::new("unconfirmed");
        bad.push_turn(calls("process_refund", &["1"])).unwrap();
        let violations = gate(&["process_refund"]).violations(&bad);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].turn_index, 0);
    }

    #[test]
    fn each_protected_call_needs_a_fresh_confirmation() {
        let mut run = Run::new("twice");
        run.push_turn(TurnDraft::user("refund both")).unwrap();
        run.push_turn(calls("process_refund", &["1"])).unwrap();
        run.push_turn(calls("process_refund", &["2"])).unwrap();
        run.push_turn(TurnDraft::user("and this one")).unwrap();
        run.push_turn(calls("cancel_order", &["3"])).unwrap();

        let violations = gate(&["process_refund", "cancel_order"]).violations(&run);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].call_id, "2");
    }

    #[test]
    fn second_protected_call_in_same_turn_fails() {
        let mut run = Run::new("same-turn");
        run.push_turn(TurnDraft::user("go")).unwrap();
        run.push_turn(calls("process_refund", &["1", "2"])).unwrap();
        let violations = gate(&["process_refund"]).violations(&run);
        assert_eq!(violations, [violation("2", "process_refund", 1)]);
    }

    #[test]
    fn unprotected_calls_are_ignored() {
        let mut run = Run::new("unprotected");
        run.push_turn(calls("lookup_order", &["1"])).unwrap();
        assert!(gate(&["process_refund"]).violations(&run).is_empty());
    }

    #[test]
    fn compile_rejects_bad_specs() {
        let none: [&str; 0] = [];
        let cases = [
            PolicySpec::new("", "tool_allowlist", ["a"]),
            PolicySpec::new("allowed", "", ["a"]),
            PolicySpec::new("allowed", "  ", ["a"]),
            PolicySpec::new("budget", "max_cost", none),
        ];
        for spec in &cases {
            let compiled = Policy::compile(spec);
            let rejected = matches!(compiled, Err(SpecError::InvalidPolicySpec(_)));
            assert!(rejected, "{spec:?}");
        }
    }

    #[test]
    fn missing_type_is_an_invalid_spec() {
        let yaml = "name: allowed\ntools: [lookup_order]\n";
        let spec: PolicySpec = serde_yaml::from_str(yaml).unwrap();
        assert!(spec.kind.is_empty());
        let err = Policy::compile(&spec).unwrap_err();
        let expected = "invalid policy spec: allowed: missing 'type'";
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn display_lists_tools() {
        let expected = "confirm (requires_confirmation: a, b)";
        assert_eq!(gate(&["b", "a"]).to_string(), expected);
    }
}
