use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::ErrorDetail;
use crate::ton::TonClient;

/// Immutable descriptor for one registered tool. The catalogue built from
/// these is rendered verbatim into the reasoning prompt and into the stream
/// handshake, so every field here is caller-visible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
    pub usage_example: String,
}

impl ToolDefinition {
    /// One catalogue line for the reasoning prompt.
    pub fn catalogue_entry(&self) -> String {
        format!(
            "- {}: {} (Example: {})\n  parameters: {}",
            self.name,
            self.description,
            self.usage_example,
            serde_json::to_string(&self.input_schema).unwrap_or_else(|_| "{}".to_string())
        )
    }
}

/// JSON-schema-shaped parameter description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: HashMap<String, PropertySchema>,
    pub required: Vec<String>,
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        ToolInputSchema {
            schema_type: "object".to_string(),
            properties: HashMap::new(),
            required: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl PropertySchema {
    pub fn string(description: &str) -> Self {
        PropertySchema {
            schema_type: "string".to_string(),
            description: description.to_string(),
            default: None,
            items: None,
            enum_values: None,
        }
    }

    pub fn boolean(description: &str) -> Self {
        PropertySchema {
            schema_type: "boolean".to_string(),
            description: description.to_string(),
            default: None,
            items: None,
            enum_values: None,
        }
    }

    pub fn string_array(description: &str) -> Self {
        PropertySchema {
            schema_type: "array".to_string(),
            description: description.to_string(),
            default: None,
            items: Some(Box::new(PropertySchema::string("array element"))),
            enum_values: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Outcome status on the result wire shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Error,
}

/// Result of one tool execution, serialized as
/// `{ status: "ok"|"error", data?, error?: { kind, message } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    /// Dispatcher-facing retry hint, not part of the wire shape.
    #[serde(skip, default)]
    pub retryable: bool,
}

impl ToolResult {
    pub fn ok(data: Value) -> Self {
        ToolResult {
            status: ToolStatus::Ok,
            data: Some(data),
            error: None,
            retryable: false,
        }
    }

    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        ToolResult {
            status: ToolStatus::Error,
            data: None,
            error: Some(ErrorDetail {
                kind: kind.into(),
                message: message.into(),
            }),
            retryable: false,
        }
    }

    pub fn retryable_error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        let mut result = ToolResult::error(kind, message);
        result.retryable = true;
        result
    }

    pub fn is_ok(&self) -> bool {
        self.status == ToolStatus::Ok
    }
}

/// Shared handles a tool needs at execution time.
#[derive(Clone)]
pub struct ToolContext {
    ton: Arc<TonClient>,
}

impl ToolContext {
    pub fn new(ton: Arc<TonClient>) -> Self {
        ToolContext { ton }
    }

    pub fn ton(&self) -> &TonClient {
        &self.ton
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_wire_shape_ok() {
        let result = ToolResult::ok(json!({"price": 2.35}));
        let wire = serde_json::to_value(&result).unwrap();
        assert_eq!(wire["status"], "ok");
        assert_eq!(wire["data"]["price"], 2.35);
        assert!(wire.get("error").is_none());
        assert!(wire.get("retryable").is_none());
    }

    #[test]
    fn test_result_wire_shape_error() {
        let result = ToolResult::retryable_error("upstream_failure", "rate limited");
        let wire = serde_json::to_value(&result).unwrap();
        assert_eq!(wire["status"], "error");
        assert_eq!(wire["error"]["kind"], "upstream_failure");
        assert_eq!(wire["error"]["message"], "rate limited");
        assert!(wire.get("data").is_none());
        assert!(result.retryable);
    }

    #[test]
    fn test_schema_serializes_json_schema_keys() {
        let mut properties = HashMap::new();
        properties.insert(
            "currency".to_string(),
            PropertySchema::string("fiat code").with_default(json!("usd")),
        );
        let schema = ToolInputSchema {
            schema_type: "object".to_string(),
            properties,
            required: vec![],
        };
        let wire = serde_json::to_value(&schema).unwrap();
        assert_eq!(wire["type"], "object");
        assert_eq!(wire["properties"]["currency"]["type"], "string");
        assert_eq!(wire["properties"]["currency"]["default"], "usd");
    }

    #[test]
    fn test_catalogue_entry_contains_contract() {
        let def = ToolDefinition {
            name: "get_ton_price".to_string(),
            description: "Current TON price".to_string(),
            input_schema: ToolInputSchema::default(),
            usage_example: r#"{"currency": "usd"}"#.to_string(),
        };
        let entry = def.catalogue_entry();
        assert!(entry.starts_with("- get_ton_price: Current TON price"));
        assert!(entry.contains(r#"(Example: {"currency": "usd"})"#));
        assert!(entry.contains("parameters:"));
    }
}
