//! Turn and tool-call types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System prompt or instructions.
    System,
    /// The human operator.
    User,
    /// The agent under test.
    Assistant,
    /// A tool-result message.
    Tool,
}

impl Role {
    /// Lowercase wire name of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latency measurements for a turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    /// End-to-end latency of the model call.
    #[serde(default)]
    pub latency_ms: Option<f64>,
    /// Time until the first streamed token arrived.
    #[serde(default)]
    pub time_to_first_token_ms: Option<f64>,
}

/// Token counts for a turn or a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    #[serde(default)]
    pub prompt: u64,
    /// Completion tokens.
    #[serde(default)]
    pub completion: u64,
    /// Prompt plus completion.
    #[serde(default)]
    pub total: u64,
}

impl TokenUsage {
    /// Usage with `total` derived from the two halves.
    #[must_use]
    pub fn new(prompt: u64, completion: u64) -> Self {
        Self {
            prompt,
            completion,
            total: prompt + completion,
        }
    }
}

/// One tool invocation embedded in an assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque identifier, unique within the run.
    pub id: String,
    /// Tool name.
    pub function: String,
    /// Argument name to value.
    pub arguments: Map<String, Value>,
    /// Value returned by the tool, or `{"error": ...}` when it failed.
    #[serde(default)]
    pub result: Value,
    /// Wall-clock duration of the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

impl ToolCall {
    /// A call with no result yet.
    pub fn new(
        id: impl Into<String>,
        function: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            function: function.into(),
            arguments,
            result: Value::Null,
            duration_ms: None,
        }
    }

    /// Seal the call with the value the tool returned.
    #[must_use]
    pub fn with_result(mut self, result: Value) -> Self {
        self.result = result;
        self
    }

    /// Seal the call with the structured error marker.
    #[must_use]
    pub fn with_error(mut self, message: impl fmt::Display) -> Self {
        self.result = serde_json::json!({ "error": message.to_string() });
        self
    }

    /// Attach the measured duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Returns the error message if the result is the error marker.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.result {
            Value::Object(obj) if obj.len() == 1 => obj.get("error").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// One conversational step. Only a [`Run`](super::Run) assigns `index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Zero-based position within the run.
    pub index: usize,
    /// Who produced the turn.
    pub role: Role,
    /// Text payload; empty for tool-only turns.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    /// Tool calls in invocation order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Latency measurements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
    /// Token usage of the model call that produced the turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
}

/// A turn that has not been appended to a run yet.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnDraft {
    /// Who produced the turn.
    pub role: Role,
    /// Text payload.
    pub content: String,
    /// Sealed tool calls.
    pub tool_calls: Vec<ToolCall>,
    /// Latency measurements.
    pub timing: Option<Timing>,
    /// Token usage.
    pub tokens: Option<TokenUsage>,
}

impl TurnDraft {
    /// A draft with the given role and text.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            timing: None,
            tokens: None,
        }
    }

    /// A user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// An assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// A system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Append one sealed tool call.
    #[must_use]
    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }

    /// Append several sealed tool calls.
    #[must_use]
    pub fn with_tool_calls(mut self, calls: impl IntoIterator<Item = ToolCall>) -> Self {
        self.tool_calls.extend(calls);
        self
    }

    /// Record model latency.
    #[must_use]
    pub fn with_latency_ms(mut self, latency_ms: f64) -> Self {
        self.timing.get_or_insert_with(Timing::default).latency_ms = Some(latency_ms);
        self
    }

    /// Record token usage; zero usage is not stored.
    #[must_use]
    pub fn with_tokens(mut self, prompt: u64, completion: u64) -> Self {
        if prompt > 0 || completion > 0 {
            self.tokens = Some(TokenUsage::new(prompt, completion));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_uses_lowercase_names() {
        let assistant = serde_json::to_value(Role::Assistant).unwrap();
        assert_eq!(assistant, json!("assistant"));
        assert_eq!(Role::User.to_string(), "user");
        assert!(serde_json::from_value::<Role>(json!("robot")).is_err());
    }

    #[test]
    fn error_marker_is_detected() {
        let call = ToolCall::new("c1", "lookup_order", Map::new()).with_error("timeout");
        assert_eq!(call.result, json!({"error": "timeout"}));
        assert_eq!(call.error(), Some("timeout"));

        let ok = ToolCall::new("c2", "lookup_order", Map::new())
            .with_result(json!({"error": "x", "status": "ok"}));
        assert_eq!(ok.error(), None);
    }

    #[test]
    fn tool_only_turn_omits_empty_content() {
        let turn = Turn {
            index: 3,
            role: Role::Assistant,
            content: String::new(),
            tool_calls: vec![ToolCall::new("c1", "ping", Map::new())],
            timing: None,
            tokens: None,
        };
        let doc = serde_json::to_value(&turn).unwrap();
        assert!(doc.get("content").is_none());
        assert_eq!(doc["tool_calls"][0]["result"], Value::Null);
    }

    #[test]
    fn zero_token_usage_is_dropped() {
        let draft = TurnDraft::assistant("hi").with_tokens(0, 0);
        assert!(draft.tokens.is_none());
        let draft = TurnDraft::assistant("hi").with_tokens(10, 5);
        assert_eq!(draft.tokens, Some(TokenUsage::new(10, 5)));
        assert_eq!(draft.tokens.map(|t| t.total), Some(15));
    }
}
