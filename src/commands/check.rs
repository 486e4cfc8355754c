//! `agentcontract check` command.

use std::path::Path;

use crate::cassette;
use crate::contract::{self, ContractConfig, Verdict};
use crate::{Error, Result};

/// Execute the `check` command.
///
/// Loads the cassette, assembles its scenario's contract from `config` (or
/// the nearest `agentcontract.yml`), prints every check and fails when any
/// check fails.
///
/// # Errors
///
/// Returns load or configuration errors, or [`Error::ContractFailed`].
pub fn run(path: &Path, config: Option<&Path>) -> Result<()> {
    let run = cassette::load(path)?;
    let config = match config {
        Some(config) => ContractConfig::load(config)?,
        None => ContractConfig::discover(path)?,
    };
    let scenario = &run.metadata.scenario;
    let contract = config.contract_for(scenario)?;
    if contract.is_empty() {
        tracing::warn!(%scenario, "no assertions or policies apply to this scenario");
    }
    let verdict = contract::evaluate(&run, &contract);
    print!("{}", report(&verdict));

    if verdict.passed {
        Ok(())
    } else {
        Err(Error::ContractFailed {
            scenario: verdict.scenario.clone(),
            failures: verdict.failures().len(),
        })
    }
}

fn report(verdict: &Verdict) -> String {
    let mut out = format!("Scenario: {}\n", verdict.scenario);
    for check in &verdict.checks {
        out.push_str(&format!("  {check}\n"));
    }
    let failed = verdict.failures().len();
    let passed = verdict.checks.len() - failed;
    let status = if verdict.passed { "PASSED" } else { "FAILED" };
    out.push_str(&format!("{status} ({passed} passed, {failed} failed)\n"));
    out
}
