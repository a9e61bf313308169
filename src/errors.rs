use serde::{Deserialize, Serialize};

/// Engine-level failure taxonomy. Every failure surfaced to a caller maps to
/// one of these; transport controllers translate them to HTTP statuses and
/// stream error frames.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Rejected before any session binding occurred.
    AuthFailure,
    /// Companion message posted for a session with no live stream.
    UnknownSession(String),
    /// Tool name absent from the registry at validation time.
    UnknownTool(String),
    /// Arguments failed strict schema validation.
    InvalidArguments(String),
    /// Reasoning provider unusable after its single retry.
    ResolutionFailed(String),
    /// External data collaborator failed.
    Upstream { message: String, retryable: bool },
    /// Per-invocation deadline exhausted.
    Timeout { seconds: u64 },
    /// Owning connection went away mid-flight.
    Cancelled,
}

impl EngineError {
    /// Stable wire identifier used in `error.kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::AuthFailure => "auth_failure",
            EngineError::UnknownSession(_) => "unknown_session",
            EngineError::UnknownTool(_) => "unknown_tool",
            EngineError::InvalidArguments(_) => "invalid_arguments",
            EngineError::ResolutionFailed(_) => "resolution_failed",
            EngineError::Upstream { .. } => "upstream_failure",
            EngineError::Timeout { .. } => "timeout",
            EngineError::Cancelled => "cancelled",
        }
    }

    /// Whether the dispatcher may retry the failed attempt.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Upstream { retryable: true, .. } | EngineError::Timeout { .. }
        )
    }

    pub fn upstream(message: impl Into<String>, retryable: bool) -> Self {
        EngineError::Upstream {
            message: message.into(),
            retryable,
        }
    }

    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail {
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::AuthFailure => write!(f, "authentication failed"),
            EngineError::UnknownSession(id) => write!(f, "no live stream for session '{}'", id),
            EngineError::UnknownTool(name) => write!(f, "tool '{}' not found", name),
            EngineError::InvalidArguments(msg) => write!(f, "invalid arguments: {}", msg),
            EngineError::ResolutionFailed(msg) => {
                write!(f, "could not resolve the request, try again: {}", msg)
            }
            EngineError::Upstream { message, .. } => write!(f, "upstream failure: {}", message),
            EngineError::Timeout { seconds } => {
                write!(f, "operation exceeded its {}s deadline", seconds)
            }
            EngineError::Cancelled => write!(f, "invocation cancelled"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Error payload of the result wire shape: `{ kind, message }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
}
