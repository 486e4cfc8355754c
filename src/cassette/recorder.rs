//! Records turns into a run and writes it as a cassette.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;

use super::codec::{self, CassetteError};
use crate::trajectory::{ModelInfo, Run, RunError, Turn, TurnDraft};

/// Name written to `source.sdk`.
pub const SDK_NAME: &str = "agentcontract-rust";

/// Builds a [`Run`] from sealed turns.
///
/// The recorder is an ordinary value: whatever produces turns (a hand-written
/// test, an SDK wrapper, a framework adapter) holds it and calls
/// [`Recorder::add_turn`]. Nothing is registered globally.
#[derive(Debug)]
pub struct Recorder {
    run: Run,
    started: Instant,
}

impl Recorder {
    /// Start recording a scenario. Stamps a fresh run id and the current time.
    pub fn new(scenario: impl Into<String>) -> Self {
        let mut run = Run::new(scenario);
        run.run_id = uuid::Uuid::new_v4().to_string();
        run.source.recorded_at = Some(Utc::now());
        run.source.recorder_version = env!("CARGO_PKG_VERSION").to_string();
        run.source.sdk = SDK_NAME.to_string();
        Self {
            run,
            started: Instant::now(),
        }
    }

    /// Set the model configuration.
    #[must_use]
    pub fn with_model(mut self, model: ModelInfo) -> Self {
        self.run.model = model;
        self
    }

    /// Set scenario tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run.metadata.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the scenario description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.run.metadata.description = description.into();
        self
    }

    /// Append a sealed turn.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::DuplicateToolCallId`] if a tool-call id repeats.
    pub fn add_turn(&mut self, draft: TurnDraft) -> Result<&Turn, RunError> {
        let turn = self.run.push_turn(draft)?;
        let calls = turn.tool_calls.len();
        tracing::trace!(index = turn.index, role = %turn.role, calls, "turn recorded");
        Ok(turn)
    }

    /// The run recorded so far.
    #[must_use]
    pub fn run(&self) -> &Run {
        &self.run
    }

    /// Record an estimated cost for the whole session.
    pub fn set_estimated_cost_usd(&mut self, cost: f64) {
        self.run.summary.estimated_cost_usd = cost;
    }

    /// Stop recording and return the run with its summary filled in.
    #[must_use]
    pub fn finish(mut self) -> Run {
        self.run.summarize();
        let elapsed = self.started.elapsed();
        self.run.summary.total_duration_ms = elapsed.as_secs_f64() * 1000.0;
        self.run
    }

    /// Stop recording and write the cassette to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(self, path: &Path) -> Result<Run, CassetteError> {
        let run = self.finish();
        codec::save(&run, path)?;
        Ok(run)
    }
}
