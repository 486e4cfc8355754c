//! Replaying adapter for the `ToolBackend` port.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::ports::{ToolBackend, ToolError};
use crate::replay::ReplayEngine;

/// Serves recorded tool results through a shared [`ReplayEngine`].
///
/// Arguments are always passed to the engine, so strict matching applies
/// whenever the engine was built with it.
pub struct ReplayingTools {
    engine: Arc<ReplayEngine>,
}

impl ReplayingTools {
    /// Create a replaying backend over `engine`.
    #[must_use]
    pub fn new(engine: Arc<ReplayEngine>) -> Self {
        Self { engine }
    }

    /// The engine, for inspecting counters after the agent finishes.
    #[must_use]
    pub fn engine(&self) -> &ReplayEngine {
        &self.engine
    }
}

/// Turns a recorded `{"error": ...}` marker back into a failure.
fn replay_result(function: &str, result: Value) -> Result<Value, ToolError> {
    match result.as_object() {
        Some(obj) if obj.len() == 1 => {
            if let Some(message) = obj.get("error").and_then(Value::as_str) {
                return Err(ToolError::Failed {
                    function: function.to_string(),
                    message: message.to_string(),
                });
            }
            Ok(result)
        }
        _ => Ok(result),
    }
}

impl ToolBackend for ReplayingTools {
    fn call(&self, function: &str, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let result = self.engine.get_result(function, Some(arguments))?;
        replay_result(function, result)
    }
}
