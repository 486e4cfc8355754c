//! Tool port: how the agent under test invokes its tools.

use serde_json::{Map, Value};

use crate::replay::ReplayError;

/// Errors returned by a [`ToolBackend`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    /// No tool with this name is available.
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    /// The tool ran and reported a failure.
    #[error("tool '{function}' failed: {message}")]
    Failed {
        /// Tool name.
        function: String,
        /// Failure message.
        message: String,
    },
    /// Replay diverged from the recording.
    #[error(transparent)]
    Replay(#[from] ReplayError),
}

/// Executes named tools with JSON arguments.
///
/// The agent's tool layer is written against this trait; live, recording and
/// replaying implementations live in `src/adapters/`.
pub trait ToolBackend: Send + Sync {
    /// Invoke `function` with `arguments` and return its result.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool is unknown, fails, or (during replay) the
    /// call diverges from the recording.
    fn call(&self, function: &str, arguments: &Map<String, Value>) -> Result<Value, ToolError>;
}
