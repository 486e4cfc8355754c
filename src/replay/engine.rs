//! Serves recorded tool results to a live caller.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use super::diff::ReplayReport;
use crate::trajectory::Run;

/// Errors raised while replaying.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReplayError {
    /// `get_result` was called before `prime`.
    #[error("replay engine has not been primed with a run")]
    NotPrimed,
    /// `prime` was called on an engine that already holds a run.
    #[error("replay engine is already primed")]
    AlreadyPrimed,
    /// The live agent called a tool more often than recorded, or a tool that
    /// was never recorded.
    #[error(
        "unexpected call to tool '{function}': recorded {recorded} time(s), \
         already served {served}"
    )]
    UnexpectedToolCall {
        /// Tool name requested by the caller.
        function: String,
        /// Number of recorded calls for this tool.
        recorded: usize,
        /// Number of calls already served.
        served: usize,
    },
    /// Strict matching found different arguments than recorded.
    #[error("tool '{function}' call {call} argument mismatch: expected {expected}, got {actual}")]
    ToolCallArgumentMismatch {
        /// Tool name.
        function: String,
        /// One-based position of the call among this tool's calls.
        call: usize,
        /// Recorded arguments.
        expected: Value,
        /// Arguments supplied during replay.
        actual: Value,
    },
}

/// Lifecycle of a [`ReplayEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayPhase {
    /// No run loaded.
    Idle,
    /// Queues built, nothing served yet.
    Primed,
    /// At least one result served and some remain.
    Serving,
    /// Every queue is drained.
    Exhausted,
}

/// Replay configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Compare supplied arguments against the recorded ones.
    pub strict_arguments: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            strict_arguments: true,
        }
    }
}

/// Per-tool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolStats {
    /// Calls present in the cassette.
    pub recorded: usize,
    /// Calls served so far (including argument mismatches).
    pub served: usize,
    /// Calls still queued.
    pub remaining: usize,
}

#[derive(Debug)]
struct RecordedCall {
    arguments: Map<String, Value>,
    result: Value,
}

#[derive(Debug, Default)]
struct ToolQueue {
    pending: VecDeque<RecordedCall>,
    recorded: usize,
}

impl ToolQueue {
    fn served(&self) -> usize {
        self.recorded - self.pending.len()
    }
}

#[derive(Debug)]
struct ReplayState {
    phase: ReplayPhase,
    queues: HashMap<String, ToolQueue>,
}

/// Replays the tool calls of one run, per tool name, in recorded order.
///
/// Each distinct tool gets its own FIFO queue, so unrelated tools may be
/// interleaved differently from the recording while every tool still sees its
/// own calls in order and exactly as many times as recorded. All state sits
/// behind one mutex: the engine can be shared across threads and pops stay
/// serialized.
#[derive(Debug)]
pub struct ReplayEngine {
    options: ReplayOptions,
    state: Mutex<ReplayState>,
}

impl Default for ReplayEngine {
    fn default() -> Self {
        Self::new(ReplayOptions::default())
    }
}

impl ReplayEngine {
    /// An idle engine.
    #[must_use]
    pub fn new(options: ReplayOptions) -> Self {
        let state = ReplayState {
            phase: ReplayPhase::Idle,
            queues: HashMap::new(),
        };
        Self {
            options,
            state: Mutex::new(state),
        }
    }

    /// An engine primed with `run` using default options.
    #[must_use]
    pub fn from_run(run: &Run) -> Self {
        let engine = Self::default();
        engine.lock().load(run);
        engine
    }

    /// Build the per-tool queues from `run`.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::AlreadyPrimed`] unless the engine is idle.
    pub fn prime(&self, run: &Run) -> Result<(), ReplayError> {
        let mut state = self.lock();
        if state.phase != ReplayPhase::Idle {
            return Err(ReplayError::AlreadyPrimed);
        }
        state.load(run);
        tracing::debug!(
            scenario = %run.metadata.scenario,
            tools = state.queues.len(),
            "replay engine primed"
        );
        Ok(())
    }

    /// Serve the next recorded result for `function`.
    ///
    /// When `arguments` is given and strict matching is on, they must equal
    /// the recorded arguments of the call being served. A mismatched call is
    /// still consumed.
    ///
    /// # Errors
    ///
    /// - [`ReplayError::NotPrimed`] before [`ReplayEngine::prime`].
    /// - [`ReplayError::UnexpectedToolCall`] if nothing is queued for `function`.
    /// - [`ReplayError::ToolCallArgumentMismatch`] on a strict mismatch.
    pub fn get_result(
        &self,
        function: &str,
        arguments: Option<&Map<String, Value>>,
    ) -> Result<Value, ReplayError> {
        let mut state = self.lock();
        if state.phase == ReplayPhase::Idle {
            return Err(ReplayError::NotPrimed);
        }

        let Some(queue) = state.queues.get_mut(function) else {
            tracing::warn!(function, "replay: tool was never recorded");
            return Err(ReplayError::UnexpectedToolCall {
                function: function.to_string(),
                recorded: 0,
                served: 0,
            });
        };
        let Some(entry) = queue.pending.pop_front() else {
            let recorded = queue.recorded;
            tracing::warn!(function, recorded, "replay: tool calls exhausted");
            return Err(ReplayError::UnexpectedToolCall {
                function: function.to_string(),
                recorded: queue.recorded,
                served: queue.served(),
            });
        };
        let call = queue.served();
        let remaining = queue.pending.len();
        state.advance();

        if let Some(actual) = arguments.filter(|_| self.options.strict_arguments) {
            if *actual != entry.arguments {
                tracing::warn!(function, call, "replay: argument mismatch");
                return Err(ReplayError::ToolCallArgumentMismatch {
                    function: function.to_string(),
                    call,
                    expected: Value::Object(entry.arguments),
                    actual: Value::Object(actual.clone()),
                });
            }
        }

        tracing::debug!(function, call, remaining, "replay: served recorded result");
        Ok(entry.result)
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> ReplayPhase {
        self.lock().phase
    }

    /// Calls still queued for `function`.
    #[must_use]
    pub fn remaining(&self, function: &str) -> usize {
        let state = self.lock();
        state.queues.get(function).map_or(0, |q| q.pending.len())
    }

    /// Whether another call to `function` would be served.
    #[must_use]
    pub fn has_results(&self, function: &str) -> bool {
        self.remaining(function) > 0
    }

    /// Counters for every recorded tool, sorted by name.
    #[must_use]
    pub fn stats(&self) -> BTreeMap<String, ToolStats> {
        let state = self.lock();
        let stats = state.queues.iter().map(|(name, q)| {
            let stats = ToolStats {
                recorded: q.recorded,
                served: q.served(),
                remaining: q.pending.len(),
            };
            (name.clone(), stats)
        });
        stats.collect()
    }

    /// Report recorded calls that were never requested.
    #[must_use]
    pub fn finish(&self) -> ReplayReport {
        let mut report = ReplayReport::default();
        for (name, stats) in self.stats() {
            if stats.remaining > 0 {
                report.missing_tools += stats.remaining;
                report.errors.push(format!(
                    "Tool '{name}' was recorded {} times but only called {} times during replay",
                    stats.recorded, stats.served
                ));
            } else {
                report.matched_tools += stats.served;
            }
        }
        report
    }

    fn lock(&self) -> MutexGuard<'_, ReplayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReplayState {
    fn load(&mut self, run: &Run) {
        self.queues.clear();
        for (_, call) in run.tool_calls() {
            let function = call.function.clone();
            let queue = self.queues.entry(function).or_default();
            queue.pending.push_back(RecordedCall {
                arguments: call.arguments.clone(),
                result: call.result.clone(),
            });
            queue.recorded += 1;
        }
        self.phase = if self.queues.is_empty() {
            ReplayPhase::Exhausted
        } else {
            ReplayPhase::Primed
        };
    }

    fn advance(&mut self) {
        self.phase = if self.queues.values().all(|q| q.pending.is_empty()) {
            ReplayPhase::Exhausted
        } else {
            ReplayPhase::Serving
        };
    }
}
