use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one reasoning pass over a user turn.
///
/// Serialized form is the JSON contract the reasoning model is asked to
/// produce: `{"action": "tool_call", "tool": ..., "arguments": {...}}`,
/// `{"action": "clarification", "question": ...}` or
/// `{"action": "direct_answer", "text": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ResolvedIntent {
    ToolCall {
        tool: String,
        #[serde(default = "empty_arguments")]
        arguments: Value,
    },
    Clarification {
        question: String,
    },
    DirectAnswer {
        text: String,
    },
}

fn empty_arguments() -> Value {
    Value::Object(serde_json::Map::new())
}
