//! Outbound frames for the persistent stream.
//!
//! Every frame is one SSE event. The handshake is the first event on a new
//! stream; everything after it arrives as a `message` event whose JSON body
//! is tagged by `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ErrorDetail;
use crate::tools::ToolDefinition;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    /// First event on a fresh stream: the bound session id and the verbatim
    /// tool catalogue, so callers discover what they may ask for.
    Handshake {
        session_id: String,
        tools: Vec<ToolDefinition>,
    },
    /// Partial assistant text produced while a turn is being worked.
    Progress { text: String },
    /// An invocation the dispatcher accepted, echoed with its normalized
    /// arguments before the upstream call starts.
    ToolCall {
        invocation_id: String,
        tool: String,
        arguments: Value,
    },
    /// Result wire shape for one invocation:
    /// `{ status: "ok"|"error", data?, error?: { kind, message } }`.
    ToolResult {
        invocation_id: String,
        result: Value,
    },
    /// Terminal event for one turn.
    Done,
    /// Structured failure. Turns end with `Done` even after an error.
    Error { error: ErrorDetail },
}

impl StreamFrame {
    pub fn error(detail: ErrorDetail) -> Self {
        StreamFrame::Error { error: detail }
    }

    fn event_name(&self) -> &'static str {
        match self {
            StreamFrame::Handshake { .. } => "handshake",
            _ => "message",
        }
    }

    /// One complete SSE event, terminator included.
    pub fn to_sse(&self) -> String {
        let body = serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"type":"error","error":{"kind":"encoding","message":"unserializable frame"}}"#.to_string());
        format!("event: {}\ndata: {}\n\n", self.event_name(), body)
    }
}

/// Comment line proxies pass through untouched; keeps idle streams open.
pub const SSE_KEEPALIVE: &str = ": keepalive\n\n";
