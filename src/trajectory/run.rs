//! The `Run` aggregate and its metadata.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::turn::{TokenUsage, ToolCall, Turn, TurnDraft};

/// Cassette schema version written by this crate.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Errors raised when appending to a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    /// A tool-call id was already used earlier in the run.
    #[error("duplicate tool call id '{0}'")]
    DuplicateToolCallId(String),
}

/// Where and when the run was recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSource {
    /// Recording timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
    /// Version of the recorder that wrote the run.
    #[serde(default)]
    pub recorder_version: String,
    /// Name of the recording SDK.
    #[serde(default)]
    pub sdk: String,
}

/// Model configuration used while recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Provider name, e.g. `openai`.
    #[serde(default)]
    pub provider: String,
    /// Model identifier.
    #[serde(default)]
    pub model: String,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f64,
    /// Nucleus sampling mass.
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    /// Completion token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling seed, when the provider supports one.
    #[serde(default)]
    pub seed: Option<i64>,
}

fn default_top_p() -> f64 {
    1.0
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            provider: String::new(),
            model: String::new(),
            temperature: 0.0,
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            seed: None,
        }
    }
}

/// Descriptive metadata about the scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Scenario name; selects per-scenario contract overrides.
    #[serde(default)]
    pub scenario: String,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Human description.
    #[serde(default)]
    pub description: String,
}

/// Aggregate statistics for the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of turns.
    #[serde(default)]
    pub total_turns: usize,
    /// Wall-clock duration of the recording session.
    #[serde(default)]
    pub total_duration_ms: f64,
    /// Token usage summed over turns.
    #[serde(default)]
    pub total_tokens: TokenUsage,
    /// Number of tool calls.
    #[serde(default)]
    pub total_tool_calls: usize,
    /// Cost estimate supplied by the recorder.
    #[serde(default)]
    pub estimated_cost_usd: f64,
}

/// A recorded agent trajectory.
///
/// Turns are append-only: [`Run::push_turn`] assigns contiguous indices and
/// rejects duplicate tool-call ids, so a `Run` value always satisfies the
/// cassette invariants. Deserialization goes through the same checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RunDocument")]
pub struct Run {
    /// Cassette schema version.
    pub schema_version: String,
    /// Unique id of the recording.
    pub run_id: String,
    /// Recording provenance.
    pub source: RunSource,
    /// Model configuration.
    pub model: ModelInfo,
    /// Scenario metadata.
    pub metadata: RunMetadata,
    /// Aggregate statistics.
    pub summary: RunSummary,
    turns: Vec<Turn>,
}

impl Default for Run {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id: String::new(),
            source: RunSource::default(),
            model: ModelInfo::default(),
            metadata: RunMetadata::default(),
            summary: RunSummary::default(),
            turns: Vec::new(),
        }
    }
}

impl Run {
    /// An empty run for the given scenario.
    pub fn new(scenario: impl Into<String>) -> Self {
        let mut run = Self::default();
        run.metadata.scenario = scenario.into();
        run
    }

    /// Turns in index order.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Turn at `index`, if any.
    #[must_use]
    pub fn turn(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index)
    }

    /// Append a sealed turn, assigning it the next index.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::DuplicateToolCallId`] if a tool call reuses an id
    /// already present in the run (or twice in the draft). The run is left
    /// unchanged in that case.
    pub fn push_turn(&mut self, draft: TurnDraft) -> Result<&Turn, RunError> {
        let ids = self.tool_calls().map(|(_, call)| call.id.as_str());
        let mut seen: HashSet<&str> = ids.collect();
        for call in &draft.tool_calls {
            if !seen.insert(call.id.as_str()) {
                return Err(RunError::DuplicateToolCallId(call.id.clone()));
            }
        }

        let index = self.turns.len();
        self.turns.push(Turn {
            index,
            role: draft.role,
            content: draft.content,
            tool_calls: draft.tool_calls,
            timing: draft.timing,
            tokens: draft.tokens,
        });
        Ok(&self.turns[index])
    }

    /// Every tool call with the index of its turn, in global run order.
    pub fn tool_calls(&self) -> impl Iterator<Item = (usize, &ToolCall)> + '_ {
        self.turns
            .iter()
            .flat_map(|turn| turn.tool_calls.iter().map(move |call| (turn.index, call)))
    }

    /// Calls of one tool, in run order.
    pub fn calls_to<'a>(&'a self, function: &'a str) -> impl Iterator<Item = &'a ToolCall> + 'a {
        self.tool_calls()
            .map(|(_, call)| call)
            .filter(move |call| call.function == function)
    }

    /// Recompute turn, tool-call and token totals from the turns.
    ///
    /// Duration and cost are left untouched; only the recorder knows them.
    pub fn summarize(&mut self) {
        let usage = self.turns.iter().filter_map(|turn| turn.tokens);
        let prompt: u64 = usage.clone().map(|u| u.prompt).sum();
        let completion: u64 = usage.map(|u| u.completion).sum();
        self.summary.total_turns = self.turns.len();
        self.summary.total_tool_calls = self.tool_calls().count();
        self.summary.total_tokens = TokenUsage::new(prompt, completion);
    }
}

/// Unchecked wire shape of a run; converted through [`Run::try_from`].
#[derive(Deserialize)]
struct RunDocument {
    #[serde(default = "default_schema_version")]
    schema_version: String,
    #[serde(default)]
    run_id: String,
    #[serde(default)]
    source: RunSource,
    #[serde(default)]
    model: ModelInfo,
    #[serde(default)]
    metadata: RunMetadata,
    #[serde(default)]
    summary: RunSummary,
    #[serde(default)]
    turns: Vec<Turn>,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl TryFrom<RunDocument> for Run {
    type Error = String;

    fn try_from(doc: RunDocument) -> Result<Self, Self::Error> {
        let mut seen = HashSet::new();
        for (position, turn) in doc.turns.iter().enumerate() {
            let index = turn.index;
            if index != position {
                return Err(format!(
                    "turn indices must be contiguous: index {index} at position {position}"
                ));
            }
            for call in &turn.tool_calls {
                let id = call.id.as_str();
                if !seen.insert(id) {
                    return Err(format!("duplicate tool call id '{id}' in turn {index}"));
                }
            }
        }

        Ok(Self {
            schema_version: doc.schema_version,
            run_id: doc.run_id,
            source: doc.source,
            model: doc.model,
            metadata: doc.metadata,
            summary: doc.summary,
            turns: doc.turns,
        })
    }
}
