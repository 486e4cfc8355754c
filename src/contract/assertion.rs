//! Assertion engine.
//!
//! An [`AssertionSpec`] is the declared `{type, target, value|schema}` shape;
//! [`Assertion::compile`] validates it once (compiling regexes and schemas) so
//! evaluation never fails on configuration, only on the run.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::target::{Resolved, Target};
use super::verdict::{CheckKind, CheckResult};
use super::SpecError;
use crate::trajectory::Run;

type Outcome = Result<(), String>;

/// Keywords that mark a `called_with` schema as a JSON Schema document
/// rather than a literal argument map.
const SCHEMA_KEYWORDS: &[&str] = &[
    "$ref",
    "type",
    "properties",
    "required",
    "additionalProperties",
    "patternProperties",
    "propertyNames",
    "minProperties",
    "maxProperties",
    "items",
    "prefixItems",
    "contains",
    "minItems",
    "maxItems",
    "uniqueItems",
    "enum",
    "const",
    "pattern",
    "format",
    "minLength",
    "maxLength",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "allOf",
    "anyOf",
    "oneOf",
    "not",
    "if",
];

/// Declared form of an assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionSpec {
    /// Assertion type, e.g. `contains`.
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Target expression.
    #[serde(default)]
    pub target: String,
    /// Expected value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// JSON Schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

impl AssertionSpec {
    /// A spec with a `value`.
    pub fn with_value(kind: &str, target: &str, value: impl Into<Value>) -> Self {
        Self {
            kind: kind.into(),
            target: target.into(),
            value: Some(value.into()),
            schema: None,
        }
    }

    /// A spec with a `schema`.
    pub fn with_schema(kind: &str, target: &str, schema: Value) -> Self {
        Self {
            kind: kind.into(),
            target: target.into(),
            value: None,
            schema: Some(schema),
        }
    }

    /// A spec with only a target.
    pub fn bare(kind: &str, target: &str) -> Self {
        Self {
            kind: kind.into(),
            target: target.into(),
            value: None,
            schema: None,
        }
    }

    fn invalid(&self, message: &str) -> SpecError {
        SpecError::InvalidAssertionSpec(format!("{}: {message}", self.kind))
    }

    fn required_value(&self) -> Result<&Value, SpecError> {
        let value = self.value.as_ref();
        value.ok_or_else(|| self.invalid("missing 'value'"))
    }

    fn required_schema(&self) -> Result<Schema, SpecError> {
        let source = self.schema.clone();
        let source = source.ok_or_else(|| self.invalid("missing 'schema'"))?;
        Schema::compile(source).map_err(|e| self.invalid(&format!("invalid schema: {e}")))
    }
}

/// A compiled JSON Schema.
#[derive(Clone)]
pub struct Schema {
    source: Value,
    validator: Arc<jsonschema::Validator>,
}

impl Schema {
    /// Compile `source`.
    ///
    /// # Errors
    ///
    /// Returns the compiler's message if `source` is not a valid schema.
    pub fn compile(source: Value) -> Result<Self, String> {
        let validator = jsonschema::Validator::new(&source).map_err(|e| e.to_string())?;
        Ok(Self {
            source,
            validator: Arc::new(validator),
        })
    }

    /// The schema document.
    #[must_use]
    pub fn source(&self) -> &Value {
        &self.source
    }

    /// Validate `instance`, joining every violation into one message.
    ///
    /// # Errors
    ///
    /// Returns the violations if `instance` does not conform.
    pub fn check(&self, instance: &Value) -> Outcome {
        if self.validator.is_valid(instance) {
            return Ok(());
        }
        let errors: Vec<String> = self
            .validator
            .iter_errors(instance)
            .map(|e| e.to_string())
            .collect();
        Err(errors.join("; "))
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Schema").field(&self.source).finish()
    }
}

/// What `called_with` compares each call against.
#[derive(Debug, Clone)]
pub enum Expected {
    /// Exact equality.
    Value(Value),
    /// Schema conformance.
    Schema(Schema),
}

/// A compiled assertion.
#[derive(Debug, Clone)]
pub enum Assertion {
    /// Text equals `value`.
    Exact {
        /// Target expression.
        target: String,
        /// Expected text.
        value: String,
    },
    /// Text contains `value`.
    Contains {
        /// Target expression.
        target: String,
        /// Expected substring.
        value: String,
    },
    /// Text matches `pattern` anywhere.
    Regex {
        /// Target expression.
        target: String,
        /// Compiled pattern.
        pattern: Regex,
    },
    /// Value conforms to `schema`.
    JsonSchema {
        /// Target expression.
        target: String,
        /// Compiled schema.
        schema: Schema,
    },
    /// No call to the tool happened.
    NotCalled {
        /// Target expression.
        target: String,
    },
    /// At least one call matches `expected`.
    CalledWith {
        /// Target expression.
        target: String,
        /// Expected arguments or result.
        expected: Expected,
    },
    /// The tool was called exactly `count` times.
    CalledCount {
        /// Target expression.
        target: String,
        /// Expected number of calls.
        count: usize,
    },
}

impl Assertion {
    /// Validate and compile a declared assertion.
    ///
    /// A `called_with` schema must use at least one JSON Schema keyword; a
    /// plain map of expected arguments belongs in `value`.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidAssertionSpec`] for a missing or unknown
    /// type, a missing target or required field, an invalid regex or schema,
    /// or a count that is not a non-negative integer.
    pub fn compile(spec: &AssertionSpec) -> Result<Self, SpecError> {
        if spec.kind.trim().is_empty() {
            let message = format!("{}: missing 'type'", spec.target);
            return Err(SpecError::InvalidAssertionSpec(message));
        }
        if spec.target.is_empty() {
            return Err(spec.invalid("missing 'target'"));
        }
        let target = spec.target.clone();

        let assertion = match spec.kind.as_str() {
            "exact" => Self::Exact {
                target,
                value: value_text(spec.required_value()?),
            },
            "contains" => Self::Contains {
                target,
                value: value_text(spec.required_value()?),
            },
            "regex" => {
                let source = value_text(spec.required_value()?);
                let pattern = Regex::new(&source)
                    .map_err(|e| spec.invalid(&format!("invalid pattern: {e}")))?;
                Self::Regex { target, pattern }
            }
            "json_schema" => Self::JsonSchema {
                target,
                schema: spec.required_schema()?,
            },
            "not_called" => Self::NotCalled { target },
            "called_with" => Self::CalledWith {
                target,
                expected: called_with_expectation(spec)?,
            },
            "called_count" => Self::CalledCount {
                target,
                count: call_count(spec)?,
            },
            other => {
                let message = format!("unknown assertion type '{other}'");
                return Err(SpecError::InvalidAssertionSpec(message));
            }
        };
        Ok(assertion)
    }

    /// Wire name of the assertion type.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Exact { .. } => "exact",
            Self::Contains { .. } => "contains",
            Self::Regex { .. } => "regex",
            Self::JsonSchema { .. } => "json_schema",
            Self::NotCalled { .. } => "not_called",
            Self::CalledWith { .. } => "called_with",
            Self::CalledCount { .. } => "called_count",
        }
    }

    /// Target expression.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::Exact { target, .. }
            | Self::Contains { target, .. }
            | Self::Regex { target, .. }
            | Self::JsonSchema { target, .. }
            | Self::NotCalled { target }
            | Self::CalledWith { target, .. }
            | Self::CalledCount { target, .. } => target,
        }
    }

    /// Check name used in verdicts, `<type>:<target>`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}:{}", self.kind(), self.target())
    }

    /// Evaluate against `run`. Never fails: resolution problems become a
    /// failed result.
    #[must_use]
    pub fn evaluate(&self, run: &Run) -> CheckResult {
        let name = self.name();
        let target = self.target().parse::<Target>();
        let resolved = match target.and_then(|t| t.resolve(run)) {
            Ok(resolved) => resolved,
            Err(e) => {
                let detail = format!("target error: {e}");
                return CheckResult::fail(name, CheckKind::Assertion, detail);
            }
        };

        match self.check(&resolved) {
            Ok(()) => {
                tracing::debug!(check = %name, "assertion passed");
                CheckResult::pass(name, CheckKind::Assertion)
            }
            Err(detail) => {
                tracing::debug!(check = %name, %detail, "assertion failed");
                CheckResult::fail(name, CheckKind::Assertion, detail)
            }
        }
    }

    fn check(&self, resolved: &Resolved) -> Outcome {
        match self {
            Self::Exact { value, .. } => each_text(resolved, |text| {
                if text == value {
                    Ok(())
                } else {
                    Err(format!("expected exact '{value}', got '{text}'"))
                }
            }),
            Self::Contains { value, .. } => each_text(resolved, |text| {
                if text.contains(value.as_str()) {
                    Ok(())
                } else {
                    Err(format!("'{value}' not found in '{text}'"))
                }
            }),
            Self::Regex { pattern, .. } => each_text(resolved, |text| {
                if pattern.is_match(text) {
                    Ok(())
                } else {
                    let pattern = pattern.as_str();
                    Err(format!("pattern '{pattern}' not matched in '{text}'"))
                }
            }),
            Self::JsonSchema { schema, .. } => each_json(resolved, |value| {
                schema
                    .check(value)
                    .map_err(|e| format!("schema validation failed: {e}"))
            }),
            Self::NotCalled { .. } => {
                let count = sequence(resolved, self.kind())?.len();
                if count == 0 {
                    Ok(())
                } else {
                    Err(format!("tool called {count} time(s), expected none"))
                }
            }
            Self::CalledWith { expected, .. } => {
                called_with(sequence(resolved, self.kind())?, expected)
            }
            Self::CalledCount { count, .. } => {
                let actual = sequence(resolved, self.kind())?.len();
                if actual == *count {
                    Ok(())
                } else {
                    Err(format!("tool called {actual} time(s), expected {count}"))
                }
            }
        }
    }
}

fn called_with_expectation(spec: &AssertionSpec) -> Result<Expected, SpecError> {
    if spec.schema.is_none() {
        return Ok(Expected::Value(spec.required_value()?.clone()));
    }
    let schema = spec.required_schema()?;
    if !has_schema_keyword(schema.source()) {
        let message = "'schema' has no JSON Schema keyword, use 'value' to match literally";
        return Err(spec.invalid(message));
    }
    Ok(Expected::Schema(schema))
}

fn has_schema_keyword(schema: &Value) -> bool {
    match schema {
        Value::Bool(_) => true,
        Value::Object(obj) => obj.keys().any(|k| SCHEMA_KEYWORDS.contains(&k.as_str())),
        _ => false,
    }
}

fn call_count(spec: &AssertionSpec) -> Result<usize, SpecError> {
    let count = match spec.required_value()? {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    let message = "'value' must be a non-negative integer";
    count.ok_or_else(|| spec.invalid(message))
}

/// Text form of a JSON value: strings verbatim, everything else as compact JSON.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Apply a text check to the resolved value, or to every element of a
/// sequence. An empty sequence fails.
fn each_text(resolved: &Resolved, check: impl Fn(&str) -> Outcome) -> Outcome {
    match resolved {
        Resolved::Text(text) | Resolved::Turn { content: text, .. } => check(text.as_str()),
        Resolved::Sequence(items) => each_item(items, |item| check(&value_text(item))),
    }
}

/// Apply a JSON check to the resolved value, or to every element of a
/// sequence. An empty sequence fails.
fn each_json(resolved: &Resolved, check: impl Fn(&Value) -> Outcome) -> Outcome {
    match resolved {
        Resolved::Sequence(items) => each_item(items, check),
        other => check(&other.to_json()),
    }
}

fn each_item(items: &[Value], check: impl Fn(&Value) -> Outcome) -> Outcome {
    if items.is_empty() {
        return Err("target resolved to no tool calls".to_string());
    }
    items
        .iter()
        .enumerate()
        .try_for_each(|(i, item)| check(item).map_err(|e| format!("call {}: {e}", i + 1)))
}

fn sequence<'a>(resolved: &'a Resolved, kind: &str) -> Result<&'a [Value], String> {
    match resolved {
        Resolved::Sequence(items) => Ok(items),
        _ => Err(format!("'{kind}' requires a tool_call:<name>:<field> target")),
    }
}

fn called_with(items: &[Value], expected: &Expected) -> Outcome {
    let matched = items.iter().any(|item| match expected {
        Expected::Value(value) => item == value,
        Expected::Schema(schema) => schema.check(item).is_ok(),
    });
    if matched {
        return Ok(());
    }
    let wanted = match expected {
        Expected::Value(value) => value.to_string(),
        Expected::Schema(schema) => format!("schema {}", schema.source()),
    };
    Err(format!("none of {} call(s) matched {wanted}", items.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::{ToolCall, TurnDraft};
    use serde_json::json;

    const FINAL: &str = "final_response";
    const LOOKUP_ARGS: &str = "tool_call:lookup_order:arguments";
    const LOOKUP_RESULT: &str = "tool_call:lookup_order:result";

    fn call(id: &str, function: &str, arguments: Value, result: Value) -> ToolCall {
        let arguments = arguments.as_object().cloned().unwrap();
        ToolCall::new(id, function, arguments).with_result(result)
    }

    fn run() -> Run {
        let first = call(
            "1",
            "lookup_order",
            json!({"order_id": "123"}),
            json!({"status": "delivered"}),
        );
        let second = call(
            "2",
            "lookup_order",
            json!({"order_id": "456"}),
            json!({"status": "pending"}),
        );
        let mut run = Run::new("assertions");
        run.push_turn(TurnDraft::user("refund order 123")).unwrap();
        let draft = TurnDraft::assistant("")
            .with_tool_call(first)
            .with_tool_call(second);
        run.push_turn(draft).unwrap();
        let done = "Your refund of $49.99 has been processed.";
        run.push_turn(TurnDraft::assistant(done)).unwrap();
        run
    }

    fn eval(spec: &AssertionSpec) -> CheckResult {
        Assertion::compile(spec).unwrap().evaluate(&run())
    }

    fn check(kind: &str, target: &str, value: impl Into<Value>) -> CheckResult {
        eval(&AssertionSpec::with_value(kind, target, value))
    }

    #[test]
    fn exact_contains_regex_on_text() {
        let text = "Your refund of $49.99 has been processed.";
        assert!(check("exact", FINAL, text).passed);
        assert!(!check("exact", FINAL, "Your refund").passed);
        assert!(check("contains", FINAL, "refund").passed);
        assert!(check("regex", FINAL, r"\$\d+\.\d{2}").passed);

        let miss = check("contains", FINAL, "cancel");
        assert!(!miss.passed);
        assert!(miss.detail.contains("'cancel' not found"));
    }

    #[test]
    fn turn_target_uses_content() {
        assert!(check("contains", "turn:0", "order 123").passed);
        let out_of_range = check("contains", "turn:9", "x");
        assert!(!out_of_range.passed);
        assert!(out_of_range.detail.contains("out of range"));
    }

    #[test]
    fn scalar_types_apply_to_every_element() {
        assert!(check("regex", LOOKUP_ARGS, r#""order_id":"\d+""#).passed);

        let result = check("contains", LOOKUP_RESULT, "delivered");
        assert!(!result.passed);
        assert!(result.detail.starts_with("call 2:"), "{}", result.detail);

        let empty = check("contains", "tool_call:refund:result", "x");
        assert_eq!(empty.detail, "target resolved to no tool calls");
    }

    #[test]
    fn string_elements_compare_verbatim() {
        let greet = call("1", "greet", json!({}), json!("hi"));
        let mut run = Run::new("strings");
        run.push_turn(TurnDraft::assistant("").with_tool_call(greet))
            .unwrap();
        let spec = AssertionSpec::with_value("exact", "tool_call:greet:result", "hi");
        assert!(Assertion::compile(&spec).unwrap().evaluate(&run).passed);
    }

    #[test]
    fn json_schema_validates_each_call() {
        let schema = json!({
            "type": "object",
            "required": ["order_id"],
            "properties": {"order_id": {"type": "string", "pattern": "^[0-9]+$"}}
        });
        let spec = AssertionSpec::with_schema("json_schema", LOOKUP_ARGS, schema);
        assert!(eval(&spec).passed);

        let strict = json!({"properties": {"status": {"const": "delivered"}}});
        let spec = AssertionSpec::with_schema("json_schema", LOOKUP_RESULT, strict);
        let result = eval(&spec);
        assert!(!result.passed);
        let expected = "call 2: schema validation failed";
        assert!(result.detail.starts_with(expected), "{}", result.detail);
    }

    #[test]
    fn sequence_aware_types() {
        let cancel = "tool_call:cancel_subscription:result";
        assert!(eval(&AssertionSpec::bare("not_called", cancel)).passed);
        let called = AssertionSpec::bare("not_called", LOOKUP_RESULT);
        assert!(!eval(&called).passed);

        assert!(check("called_count", LOOKUP_RESULT, 2).passed);
        let absent = "tool_call:absent:result";
        assert!(check("called_count", absent, 0).passed);
        let wrong = check("called_count", LOOKUP_ARGS, "1");
        assert_eq!(wrong.detail, "tool called 2 time(s), expected 1");

        let requires_calls = eval(&AssertionSpec::bare("not_called", FINAL));
        assert!(!requires_calls.passed);
        assert!(requires_calls.detail.contains("requires a tool_call"));
    }

    #[test]
    fn called_with_is_existential() {
        let second = json!({"order_id": "456"});
        assert!(check("called_with", LOOKUP_ARGS, second).passed);
        assert!(!check("called_with", LOOKUP_ARGS, json!({})).passed);

        let pending = json!({"properties": {"status": {"const": "pending"}}});
        let by_schema = AssertionSpec::with_schema("called_with", LOOKUP_RESULT, pending);
        assert!(eval(&by_schema).passed);

        let nothing = check("called_with", "tool_call:refund:arguments", json!({}));
        assert_eq!(nothing.detail, "none of 0 call(s) matched {}");
    }

    #[test]
    fn unknown_target_is_a_failed_result() {
        let result = check("contains", "last_message", "x");
        assert!(!result.passed);
        let expected = "target error: unknown target syntax 'last_message'";
        assert_eq!(result.detail, expected);
    }

    #[test]
    fn compile_rejects_bad_specs() {
        let literal_args = json!({"order_id": "123"});
        let cases = [
            AssertionSpec::with_value("semantic", FINAL, "x"),
            AssertionSpec::with_value("", FINAL, "x"),
            AssertionSpec::bare("exact", FINAL),
            AssertionSpec::with_value("contains", "", "x"),
            AssertionSpec::with_value("regex", FINAL, "("),
            AssertionSpec::bare("json_schema", FINAL),
            AssertionSpec::with_schema("json_schema", FINAL, json!({"type": 12})),
            AssertionSpec::bare("called_with", LOOKUP_ARGS),
            AssertionSpec::with_schema("called_with", LOOKUP_ARGS, literal_args),
            AssertionSpec::with_value("called_count", LOOKUP_RESULT, -1),
            AssertionSpec::with_value("called_count", LOOKUP_RESULT, "many"),
        ];
        for spec in &cases {
            let compiled = Assertion::compile(spec);
            let rejected = matches!(compiled, Err(SpecError::InvalidAssertionSpec(_)));
            assert!(rejected, "{spec:?}");
        }
    }

    #[test]
    fn missing_type_is_an_invalid_spec() {
        let yaml = "target: final_response\nvalue: x\n";
        let spec: AssertionSpec = serde_yaml::from_str(yaml).unwrap();
        assert!(spec.kind.is_empty());
        let err = Assertion::compile(&spec).unwrap_err();
        let expected = "invalid assertion spec: final_response: missing 'type'";
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn spec_deserializes_from_yaml() {
        let yaml = "type: called_count\ntarget: tool_call:lookup_order:result\nvalue: 1\n";
        let spec: AssertionSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.kind, "called_count");
        assert_eq!(spec.value, Some(json!(1)));
        let compiled = Assertion::compile(&spec).unwrap();
        let expected = format!("called_count:{LOOKUP_RESULT}");
        assert_eq!(compiled.name(), expected);
    }
}
