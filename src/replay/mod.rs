//! Deterministic replay of recorded tool calls.

pub mod diff;
pub mod engine;

pub use diff::{diff_runs, ReplayReport};
pub use engine::{ReplayEngine, ReplayError, ReplayOptions, ReplayPhase, ToolStats};
