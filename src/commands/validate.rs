//! `agentcontract validate` command.

use std::path::Path;

use crate::cassette;
use crate::Result;

/// Execute the `validate` command.
///
/// # Errors
///
/// Returns the decode or I/O error when the cassette is invalid.
pub fn run(path: &Path) -> Result<()> {
    let run = cassette::load(path)?;
    let scenario = &run.metadata.scenario;
    let turns = run.turns().len();
    println!("Valid cassette: {scenario} ({turns} turns)");
    Ok(())
}
