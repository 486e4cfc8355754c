//! Recording adapter for the `ToolBackend` port.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use serde_json::{Map, Value};

use crate::ports::{ToolBackend, ToolError};
use crate::trajectory::ToolCall;

/// Runs tools through an inner backend and seals every call as a [`ToolCall`].
///
/// Calls accumulate until [`RecordingTools::take_calls`] hands them to the
/// assistant turn that issued them. Failed calls are sealed with the
/// `{"error": ...}` marker so replay can reproduce the failure.
pub struct RecordingTools<B> {
    inner: B,
    pending: Mutex<Vec<ToolCall>>,
}

impl<B: ToolBackend> RecordingTools<B> {
    /// Wrap a live backend.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Drain the calls sealed since the last drain, in invocation order.
    pub fn take_calls(&self) -> Vec<ToolCall> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *pending)
    }
}

impl<B: ToolBackend> ToolBackend for RecordingTools<B> {
    fn call(&self, function: &str, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let id = format!("call_{}", uuid::Uuid::new_v4().simple());
        let started = Instant::now();
        let outcome = self.inner.call(function, arguments);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let call = ToolCall::new(id, function, arguments.clone());
        let call = call.with_duration_ms(elapsed_ms);
        let call = match &outcome {
            Ok(result) => call.with_result(result.clone()),
            Err(ToolError::Failed { message, .. }) => call.with_error(message),
            Err(err) => call.with_error(err),
        };
        let failed = outcome.is_err();
        tracing::debug!(function, id = %call.id, failed, "tool call recorded");
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.push(call);
        outcome
    }
}
