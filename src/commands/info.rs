//! `agentcontract info` command.

use std::path::Path;

use crate::cassette;
use crate::trajectory::Run;
use crate::Result;

/// Execute the `info` command: print a summary of the cassette at `path`.
///
/// # Errors
///
/// Returns an error if the cassette cannot be loaded.
pub fn run(path: &Path) -> Result<()> {
    let run = cassette::load(path)?;
    print!("{}", describe(&run));
    Ok(())
}

fn describe(run: &Run) -> String {
    let recorded = run
        .source
        .recorded_at
        .map_or_else(|| "unknown".to_string(), |t| t.to_rfc3339());
    let model = format!("{}/{}", run.model.provider, run.model.model);
    let summary = &run.summary;
    let rows = [
        ("Scenario", run.metadata.scenario.clone()),
        ("Run ID", run.run_id.clone()),
        ("Recorded", recorded),
        ("Model", model),
        ("Turns", summary.total_turns.to_string()),
        ("Tool calls", summary.total_tool_calls.to_string()),
        ("Duration", format!("{:.0}ms", summary.total_duration_ms)),
        ("Tokens", summary.total_tokens.total.to_string()),
        ("Est. cost", format!("${:.4}", summary.estimated_cost_usd)),
    ];
    let lines = rows.iter().map(|(label, value)| {
        let label = format!("{label}:");
        format!("{label:<12} {value}\n")
    });
    lines.collect()
}
