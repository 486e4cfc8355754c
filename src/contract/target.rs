//! Target expressions: addressing parts of a run.
//!
//! | Expression                   | Resolves to                                 |
//! |------------------------------|---------------------------------------------|
//! | `final_response`             | text of the last assistant turn             |
//! | `turn:N`                     | content and tool calls of turn `N`          |
//! | `full_conversation`          | `role: content` lines for every text turn   |
//! | `tool_call:<name>:arguments` | arguments of every call to `<name>`         |
//! | `tool_call:<name>:result`    | results of every call to `<name>`           |

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::trajectory::{Role, Run, ToolCall};

/// Errors raised while parsing or resolving a target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    /// `final_response` on a run without assistant turns.
    #[error("run has no assistant turn")]
    NoAssistantTurn,
    /// `turn:N` with `N` past the end of the run.
    #[error("turn index {index} out of range (run has {len} turns)")]
    TurnIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of turns in the run.
        len: usize,
    },
    /// The expression matches none of the supported forms.
    #[error("unknown target syntax '{0}'")]
    UnknownTargetSyntax(String),
}

/// Which half of a tool call a `tool_call:` target addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolField {
    /// The call arguments.
    Arguments,
    /// The call result.
    Result,
}

/// A parsed target expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `final_response`
    FinalResponse,
    /// `turn:N`
    Turn(usize),
    /// `full_conversation`
    FullConversation,
    /// `tool_call:<name>:arguments|result`
    ToolCall {
        /// Tool name.
        name: String,
        /// Addressed field.
        field: ToolField,
    },
}

/// A resolved target value.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// A single piece of text.
    Text(String),
    /// One turn: its text and its tool calls.
    Turn {
        /// Turn content.
        content: String,
        /// Tool calls attached to the turn.
        tool_calls: Vec<ToolCall>,
    },
    /// One value per matching tool call, in run order.
    Sequence(Vec<Value>),
}

impl Resolved {
    /// The value as a JSON document.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Turn {
                content,
                tool_calls,
            } => serde_json::json!({
                "content": content,
                "tool_calls": tool_calls,
            }),
            Self::Sequence(items) => Value::Array(items.clone()),
        }
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let unknown = || TargetError::UnknownTargetSyntax(expr.to_string());
        match expr {
            "final_response" => return Ok(Self::FinalResponse),
            "full_conversation" => return Ok(Self::FullConversation),
            _ => {}
        }

        if let Some(index) = expr.strip_prefix("turn:") {
            if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                return Err(unknown());
            }
            // Too large for usize: no run can hold it, so it resolves out of range.
            let index = index.parse().unwrap_or(usize::MAX);
            return Ok(Self::Turn(index));
        }

        if let Some(rest) = expr.strip_prefix("tool_call:") {
            let (name, field) = rest.rsplit_once(':').ok_or_else(unknown)?;
            let field = match field {
                "arguments" => ToolField::Arguments,
                "result" => ToolField::Result,
                _ => return Err(unknown()),
            };
            if name.is_empty() {
                return Err(unknown());
            }
            let name = name.to_string();
            return Ok(Self::ToolCall { name, field });
        }

        Err(unknown())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FinalResponse => f.write_str("final_response"),
            Self::Turn(index) => write!(f, "turn:{index}"),
            Self::FullConversation => f.write_str("full_conversation"),
            Self::ToolCall { name, field } => {
                let field = match field {
                    ToolField::Arguments => "arguments",
                    ToolField::Result => "result",
                };
                write!(f, "tool_call:{name}:{field}")
            }
        }
    }
}

impl Target {
    /// Extract the addressed value from `run`. Pure and repeatable.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError::NoAssistantTurn`] or
    /// [`TargetError::TurnIndexOutOfRange`] when the run lacks the turn.
    pub fn resolve(&self, run: &Run) -> Result<Resolved, TargetError> {
        match self {
            Self::FinalResponse => final_response(run).map(Resolved::Text),
            Self::Turn(index) => {
                let index = *index;
                let len = run.turns().len();
                let out_of_range = TargetError::TurnIndexOutOfRange { index, len };
                let turn = run.turn(index).ok_or(out_of_range)?;
                Ok(Resolved::Turn {
                    content: turn.content.clone(),
                    tool_calls: turn.tool_calls.clone(),
                })
            }
            Self::FullConversation => Ok(Resolved::Text(full_conversation(run))),
            Self::ToolCall { name, field } => {
                let values = run.calls_to(name).map(|call| match field {
                    ToolField::Arguments => Value::Object(call.arguments.clone()),
                    ToolField::Result => call.result.clone(),
                });
                Ok(Resolved::Sequence(values.collect()))
            }
        }
    }

    /// Whether the target addresses tool calls.
    #[must_use]
    pub fn is_tool_call(&self) -> bool {
        matches!(self, Self::ToolCall { .. })
    }
}

/// Parse and resolve in one step.
///
/// # Errors
///
/// Any parse or resolution error of [`Target`].
pub fn resolve(expr: &str, run: &Run) -> Result<Resolved, TargetError> {
    expr.parse::<Target>()?.resolve(run)
}

fn final_response(run: &Run) -> Result<String, TargetError> {
    let turns = run.turns().iter().rev();
    let mut assistant = turns.filter(|t| t.role == Role::Assistant).peekable();
    let last = *assistant.peek().ok_or(TargetError::NoAssistantTurn)?;
    let spoken = assistant.find(|t| !t.content.is_empty());
    Ok(spoken.unwrap_or(last).content.clone())
}

fn full_conversation(run: &Run) -> String {
    run.turns()
        .iter()
        .filter(|t| !t.content.is_empty())
        .map(|t| format!("{}: {}", t.role, t.content))
        .collect::<Vec<_>>()
        .join("\n")
}
