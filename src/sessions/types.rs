use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ErrorDetail;

/// Turn role in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TurnRole {
    User,
    Assistant,
    ToolResult,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
            TurnRole::ToolResult => "tool-result",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(TurnRole::User),
            "assistant" => Some(TurnRole::Assistant),
            "tool-result" | "tool_result" => Some(TurnRole::ToolResult),
            _ => None,
        }
    }
}

/// One message within a session. Tool-result turns reference their
/// invocation record by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<String>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Turn {
            role: TurnRole::User,
            content: content.into(),
            created_at: Utc::now(),
            invocation_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Turn {
            role: TurnRole::Assistant,
            content: content.into(),
            created_at: Utc::now(),
            invocation_id: None,
        }
    }

    pub fn tool_result(content: impl Into<String>, invocation_id: impl Into<String>) -> Self {
        Turn {
            role: TurnRole::ToolResult,
            content: content.into(),
            created_at: Utc::now(),
            invocation_id: Some(invocation_id.into()),
        }
    }
}

/// Lifecycle of one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

impl InvocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationStatus::Pending => "pending",
            InvocationStatus::Succeeded => "succeeded",
            InvocationStatus::Failed => "failed",
            InvocationStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(InvocationStatus::Pending),
            "succeeded" => Some(InvocationStatus::Succeeded),
            "failed" => Some(InvocationStatus::Failed),
            "cancelled" | "canceled" => Some(InvocationStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvocationStatus::Pending)
    }
}

impl std::fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bookkeeping record for one dispatched tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub tool: String,
    pub arguments: Value,
    pub status: InvocationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ToolInvocation {
    pub fn pending(id: impl Into<String>, tool: impl Into<String>, arguments: Value) -> Self {
        ToolInvocation {
            id: id.into(),
            tool: tool.into(),
            arguments,
            status: InvocationStatus::Pending,
            result_summary: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [TurnRole::User, TurnRole::Assistant, TurnRole::ToolResult] {
            assert_eq!(TurnRole::from_str(role.as_str()), Some(role));
        }
        assert_eq!(TurnRole::from_str("nope"), None);
    }

    #[test]
    fn test_role_wire_names() {
        let turn = Turn::tool_result("{}", "inv-1");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "tool-result");
        assert_eq!(json["invocation_id"], "inv-1");
    }

    #[test]
    fn test_status_terminal() {
        assert!(!InvocationStatus::Pending.is_terminal());
        assert!(InvocationStatus::Succeeded.is_terminal());
        assert!(InvocationStatus::Cancelled.is_terminal());
        assert_eq!(
            InvocationStatus::from_str("canceled"),
            Some(InvocationStatus::Cancelled)
        );
    }
}
