//! Turn pipeline: lane acquisition, intent resolution, strict validation,
//! bounded-retry invocation, session bookkeeping and frame emission.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::sink::FrameSink;
use crate::ai::{IntentResolver, ResolvedIntent};
use crate::errors::EngineError;
use crate::gateway::StreamFrame;
use crate::sessions::{
    InvocationStatus, SessionLaneManager, SessionStore, ToolInvocation, Turn, SESSION_TURN_LIMIT,
};
use crate::tools::schema::validate_arguments;
use crate::tools::{Tool, ToolContext, ToolRegistry, ToolResult};

/// Attempt ceiling for one invocation, first try included.
const MAX_ATTEMPTS: u32 = 3;
/// Backoff before attempt n is `base << (n - 2)`.
const BACKOFF_BASE_MS: u64 = 500;
/// Tool-result turns are capped at this many bytes of summary.
const RESULT_SUMMARY_LIMIT: usize = 2048;
const TRUNCATION_MARKER: &str = "…[truncated]";

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    store: Arc<SessionStore>,
    lanes: Arc<SessionLaneManager>,
    resolver: IntentResolver,
    tool_context: ToolContext,
    tool_deadline: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        store: Arc<SessionStore>,
        lanes: Arc<SessionLaneManager>,
        resolver: IntentResolver,
        tool_context: ToolContext,
        tool_deadline_secs: u64,
    ) -> Self {
        Dispatcher {
            registry,
            store,
            lanes,
            resolver,
            tool_context,
            tool_deadline: Duration::from_secs(tool_deadline_secs),
        }
    }

    /// Run one user turn to completion.
    ///
    /// Holds the session lane for the whole turn, so turns for one session
    /// are single-writer while other sessions proceed in parallel. A
    /// resolution failure leaves the session untouched; once an intent is
    /// accepted, the user turn and its outcome are appended together.
    pub async fn handle_turn(
        &self,
        session_id: &str,
        message: &str,
        sink: &dyn FrameSink,
        cancel: &CancellationToken,
    ) {
        let _lane = tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("[DISPATCH] Turn for {} cancelled before it started", session_id);
                return;
            }
            guard = self.lanes.acquire(session_id) => guard,
        };

        self.store.get_or_create(session_id);
        let history = self.store.read_context(session_id, SESSION_TURN_LIMIT);

        let intent = tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("[DISPATCH] Turn for {} cancelled during resolution", session_id);
                return;
            }
            resolved = self.resolver.resolve(&self.registry, &history, message) => resolved,
        };

        let intent = match intent {
            Ok(intent) => intent,
            Err(e) => {
                // Nothing was appended; the session reads as if this turn
                // never happened.
                log::warn!("[DISPATCH] Resolution failed for {}: {}", session_id, e);
                sink.emit(StreamFrame::error(e.detail()));
                sink.emit(StreamFrame::Done);
                return;
            }
        };

        self.store.append_turn(session_id, Turn::user(message));

        match intent {
            ResolvedIntent::DirectAnswer { text } => {
                self.store.append_turn(session_id, Turn::assistant(&text));
                sink.emit(StreamFrame::Progress { text });
                sink.emit(StreamFrame::Done);
            }
            ResolvedIntent::Clarification { question } => {
                self.store.append_turn(session_id, Turn::assistant(&question));
                sink.emit(StreamFrame::Progress { text: question });
                sink.emit(StreamFrame::Done);
            }
            ResolvedIntent::ToolCall { tool, arguments } => {
                self.invoke(session_id, &tool, &arguments, sink, cancel).await;
            }
        }
    }

    /// Validate and execute one tool call, streaming its frames and
    /// recording the invocation in the session.
    ///
    /// Validation failures are surfaced to the caller and never reach the
    /// upstream collaborator. Retryable upstream failures are retried with
    /// exponential backoff up to the attempt ceiling, all under one
    /// per-invocation deadline.
    pub async fn invoke(
        &self,
        session_id: &str,
        tool_name: &str,
        raw_arguments: &Value,
        sink: &dyn FrameSink,
        cancel: &CancellationToken,
    ) {
        let tool = match self.registry.get(tool_name) {
            Some(tool) => tool,
            None => {
                let error = EngineError::UnknownTool(tool_name.to_string());
                log::warn!("[DISPATCH] {}", error);
                self.store
                    .append_turn(session_id, Turn::assistant(error.to_string()));
                sink.emit(StreamFrame::error(error.detail()));
                sink.emit(StreamFrame::Done);
                return;
            }
        };

        let definition = tool.definition();
        let arguments = match validate_arguments(&definition.input_schema, raw_arguments) {
            Ok(normalized) => normalized,
            Err(problems) => {
                let error = EngineError::InvalidArguments(problems);
                log::warn!("[DISPATCH] Rejected call to {}: {}", tool_name, error);
                self.store
                    .append_turn(session_id, Turn::assistant(error.to_string()));
                sink.emit(StreamFrame::error(error.detail()));
                sink.emit(StreamFrame::Done);
                return;
            }
        };

        let invocation_id = Uuid::new_v4().to_string();
        self.store.record_invocation(
            session_id,
            ToolInvocation::pending(&invocation_id, tool_name, arguments.clone()),
        );
        sink.emit(StreamFrame::ToolCall {
            invocation_id: invocation_id.clone(),
            tool: tool_name.to_string(),
            arguments: arguments.clone(),
        });

        log::info!(
            "[DISPATCH] Invoking {} for session {} ({})",
            tool_name,
            session_id,
            invocation_id
        );

        match self.run_with_retries(tool.as_ref(), &arguments, cancel).await {
            Ok(result) => {
                let wire = serde_json::to_value(&result).unwrap_or(Value::Null);
                let summary = summarize(&wire);
                let status = if result.is_ok() {
                    InvocationStatus::Succeeded
                } else {
                    InvocationStatus::Failed
                };
                self.store.finish_invocation(
                    session_id,
                    &invocation_id,
                    status,
                    Some(summary.clone()),
                    result.error.clone(),
                );
                self.store
                    .append_turn(session_id, Turn::tool_result(summary, &invocation_id));
                sink.emit(StreamFrame::ToolResult {
                    invocation_id,
                    result: wire,
                });
                sink.emit(StreamFrame::Done);
            }
            Err(EngineError::Cancelled) => {
                // The connection is gone; record the outcome and say nothing.
                log::info!(
                    "[DISPATCH] Invocation {} of {} cancelled",
                    invocation_id,
                    tool_name
                );
                self.store.finish_invocation(
                    session_id,
                    &invocation_id,
                    InvocationStatus::Cancelled,
                    None,
                    None,
                );
            }
            Err(error) => {
                log::warn!(
                    "[DISPATCH] Invocation {} of {} failed: {}",
                    invocation_id,
                    tool_name,
                    error
                );
                let detail = error.detail();
                let wire = serde_json::to_value(&ToolResult::error(
                    detail.kind.clone(),
                    detail.message.clone(),
                ))
                .unwrap_or(Value::Null);
                let summary = summarize(&wire);
                self.store.finish_invocation(
                    session_id,
                    &invocation_id,
                    InvocationStatus::Failed,
                    Some(summary.clone()),
                    Some(detail.clone()),
                );
                self.store
                    .append_turn(session_id, Turn::tool_result(summary, &invocation_id));
                sink.emit(StreamFrame::error(detail));
                sink.emit(StreamFrame::Done);
            }
        }
    }

    /// Execute with the per-invocation deadline and bounded backoff.
    ///
    /// An `Ok` carries the tool's own outcome, success or a non-retryable
    /// upstream error; `Err` is reserved for the deadline and cancellation.
    async fn run_with_retries(
        &self,
        tool: &dyn Tool,
        arguments: &Value,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, EngineError> {
        let deadline = Instant::now() + self.tool_deadline;

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                let backoff = Duration::from_millis(BACKOFF_BASE_MS << (attempt - 2));
                log::info!(
                    "[DISPATCH] Retry {}/{} after {:?}",
                    attempt,
                    MAX_ATTEMPTS,
                    backoff
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(EngineError::Timeout {
                    seconds: self.tool_deadline.as_secs(),
                });
            }

            let attempt_result = tokio::select! {
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                outcome = tokio::time::timeout(
                    remaining,
                    tool.execute(arguments.clone(), &self.tool_context),
                ) => outcome,
            };

            match attempt_result {
                Ok(result) if result.retryable && attempt < MAX_ATTEMPTS => {
                    log::warn!(
                        "[DISPATCH] Attempt {}/{} hit a retryable failure: {}",
                        attempt,
                        MAX_ATTEMPTS,
                        result
                            .error
                            .as_ref()
                            .map(|e| e.message.as_str())
                            .unwrap_or("unknown")
                    );
                }
                Ok(result) => return Ok(result),
                Err(_elapsed) => {
                    return Err(EngineError::Timeout {
                        seconds: self.tool_deadline.as_secs(),
                    })
                }
            }
        }

        unreachable!("retry loop always returns by the last attempt")
    }
}

/// Compact serialization of the result wire shape, bounded so a large
/// upstream payload cannot blow up the session history.
fn summarize(wire: &Value) -> String {
    let full = wire.to_string();
    if full.len() <= RESULT_SUMMARY_LIMIT {
        return full;
    }
    let mut cut = RESULT_SUMMARY_LIMIT;
    while !full.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &full[..cut], TRUNCATION_MARKER)
}
