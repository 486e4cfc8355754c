//! Contract evaluation.

use super::verdict::Verdict;
use super::Contract;
use crate::trajectory::Run;

/// Run every assertion and policy of `contract` against `run`.
///
/// Every check always runs; a failing check never stops the others.
#[must_use]
pub fn evaluate(run: &Run, contract: &Contract) -> Verdict {
    let scenario = &run.metadata.scenario;
    let span = tracing::debug_span!("evaluate", %scenario, declared = contract.len());
    let _entered = span.entered();

    let assertions = contract.assertions.iter().map(|a| a.evaluate(run));
    let mut checks: Vec<_> = assertions.collect();
    checks.extend(contract.policies.iter().flat_map(|p| p.evaluate(run)));

    let verdict = Verdict::new(scenario.clone(), checks);
    tracing::info!(
        scenario = %verdict.scenario,
        passed = verdict.passed,
        checks = verdict.checks.len(),
        failures = verdict.failures().len(),
        "contract evaluated"
    );
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{AssertionSpec, ContractSpec, PolicySpec};
    use crate::trajectory::{ToolCall, TurnDraft};
    use serde_json::Map;

    fn run() -> Run {
        let delete = ToolCall::new("1", "delete_account", Map::new());
        let drafts = [
            TurnDraft::user("refund please"),
            TurnDraft::assistant("").with_tool_call(delete),
            TurnDraft::assistant("Done, refund issued."),
        ];
        let mut run = Run::new("evaluator");
        for draft in drafts {
            run.push_turn(draft).unwrap();
        }
        run
    }

    #[test]
    fn collects_all_checks_even_after_failures() {
        let contains = |value| AssertionSpec::with_value("contains", "final_response", value);
        let allowed = PolicySpec::new("allowed", "tool_allowlist", ["lookup_order"]);
        let spec = ContractSpec {
            assertions: vec![contains("cancel"), contains("refund")],
            policies: vec![allowed],
        };
        let contract = Contract::compile(&spec).unwrap();

        let verdict = evaluate(&run(), &contract);
        assert_eq!(verdict.scenario, "evaluator");
        assert!(!verdict.passed);
        assert_eq!(verdict.checks.len(), 3);
        let failures = verdict.failures();
        let failed: Vec<_> = failures.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(failed, ["contains:final_response", "policy:allowed"]);
    }

    #[test]
    fn empty_contract_passes() {
        let verdict = evaluate(&run(), &Contract::default());
        assert!(verdict.passed);
        assert!(verdict.checks.is_empty());
    }
}
