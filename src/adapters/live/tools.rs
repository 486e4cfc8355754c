//! Live adapter for the `ToolBackend` port.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::ports::{ToolBackend, ToolError};

type ToolFn = dyn Fn(&Map<String, Value>) -> Result<Value, String> + Send + Sync;

/// Dispatches tool calls to registered closures.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<ToolFn>>,
}

impl ToolRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous handler.
    #[must_use]
    pub fn with_tool<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.tools.insert(name.into(), Box::new(handler));
        self
    }

    /// Registered tool names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl ToolBackend for ToolRegistry {
    fn call(&self, function: &str, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let Some(handler) = self.tools.get(function) else {
            return Err(ToolError::UnknownTool(function.to_string()));
        };
        handler(arguments).map_err(|message| ToolError::Failed {
            function: function.to_string(),
            message,
        })
    }
}
