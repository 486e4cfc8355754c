//! Trajectory data model.
//!
//! A [`Run`] is an ordered sequence of [`Turn`]s, each optionally carrying
//! sealed [`ToolCall`]s. These types are what cassettes persist, what the
//! replay engine serves from, and what contracts are evaluated against.

mod run;
mod turn;

pub use run::{ModelInfo, Run, RunError, RunMetadata, RunSource, RunSummary, SCHEMA_VERSION};
pub use turn::{Role, Timing, TokenUsage, ToolCall, Turn, TurnDraft};
