use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::claude::ClaudeClient;
use super::types::ResolvedIntent;
use crate::errors::EngineError;
use crate::sessions::Turn;
use crate::tools::schema::validate_arguments;
use crate::tools::ToolRegistry;

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("fenced JSON pattern must compile")
});

/// Turns a raw user message into one routing decision via a single
/// reasoning call.
///
/// The prompt carries the project description, the tool catalogue verbatim
/// and the session's recent turns; the model replies with one JSON object.
/// Tool calls the model gets wrong (unknown name, missing or mistyped
/// required arguments) resolve to clarifications; the dispatcher still
/// re-validates strictly before anything executes.
pub struct IntentResolver {
    claude: ClaudeClient,
    project_context: Option<String>,
}

impl IntentResolver {
    pub fn new(claude: ClaudeClient, project_context: Option<String>) -> Self {
        IntentResolver {
            claude,
            project_context,
        }
    }

    pub async fn resolve(
        &self,
        registry: &ToolRegistry,
        history: &[Turn],
        message: &str,
    ) -> Result<ResolvedIntent, EngineError> {
        let prompt = build_prompt(
            self.project_context.as_deref(),
            &registry.catalogue(),
            history,
            message,
        );
        let reply = self
            .claude
            .complete(&prompt)
            .await
            .map_err(|e| EngineError::ResolutionFailed(e.to_string()))?;
        interpret(registry, &reply)
    }
}

/// Decode the model reply into an intent, filling declared defaults.
///
/// A tool call naming a tool outside the registry, or one whose arguments
/// fail the declared schema, comes back as a clarification rather than a
/// bad call: required fields are never guessed on the model's behalf. The
/// dispatcher still re-validates whatever passes here.
fn interpret(registry: &ToolRegistry, reply: &str) -> Result<ResolvedIntent, EngineError> {
    let value = extract_json(reply).ok_or_else(|| {
        EngineError::ResolutionFailed("reasoning reply contained no JSON object".to_string())
    })?;
    let intent: ResolvedIntent = serde_json::from_value(value)
        .map_err(|e| EngineError::ResolutionFailed(format!("unrecognized reply shape: {}", e)))?;

    let (tool, arguments) = match intent {
        ResolvedIntent::ToolCall { tool, arguments } => (tool, arguments),
        other => return Ok(other),
    };

    let definition = match registry.describe(&tool) {
        Ok(definition) => definition,
        Err(_) => {
            log::warn!("[RESOLVE] Model named unknown tool '{}'", tool);
            return Ok(ResolvedIntent::Clarification {
                question: format!(
                    "I don't have an operation called '{}'. Could you rephrase what you need?",
                    tool
                ),
            });
        }
    };

    match validate_arguments(&definition.input_schema, &arguments) {
        Ok(normalized) => Ok(ResolvedIntent::ToolCall {
            tool,
            arguments: normalized,
        }),
        Err(problem) => {
            log::warn!("[RESOLVE] Model arguments for '{}' rejected: {}", tool, problem);
            Ok(ResolvedIntent::Clarification {
                question: format!(
                    "I need more detail before running {}: {}. Could you provide it?",
                    tool, problem
                ),
            })
        }
    }
}

fn build_prompt(
    project_context: Option<&str>,
    catalogue: &str,
    history: &[Turn],
    message: &str,
) -> String {
    let mut prompt = String::new();
    if let Some(context) = project_context {
        prompt.push_str("[PROJECT CONTEXT]\n");
        prompt.push_str(context);
        prompt.push_str("\n---\n");
    }

    prompt.push_str(
        "You route natural-language requests for a TON blockchain query service. \
         Pick exactly one action for the new user message.\n\nAvailable tools:\n",
    );
    prompt.push_str(catalogue);
    prompt.push('\n');

    if !history.is_empty() {
        prompt.push_str("\n[SESSION HISTORY]\n");
        for turn in history {
            prompt.push_str(turn.role.as_str());
            prompt.push_str(": ");
            prompt.push_str(&turn.content);
            prompt.push('\n');
        }
        prompt.push_str("---\n");
    }

    prompt.push_str("\nUser message: ");
    prompt.push_str(message);
    prompt.push_str(
        "\n\nReply with one JSON object and nothing else:\n\
         {\"action\": \"tool_call\", \"tool\": \"<name>\", \"arguments\": {...}} to run a tool,\n\
         {\"action\": \"clarification\", \"question\": \"...\"} when a required argument is missing or ambiguous,\n\
         {\"action\": \"direct_answer\", \"text\": \"...\"} when no tool applies.\n\
         Never guess values for required arguments. Leave out optional arguments you have no value for.",
    );
    prompt
}

/// Pull the first JSON object out of a model reply: direct parse, then a
/// fenced code block, then a brace scan over the raw text.
fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }

    if let Some(captures) = FENCED_JSON.captures(trimmed) {
        if let Some(inner) = captures.get(1) {
            if let Ok(value) = serde_json::from_str::<Value>(inner.as_str().trim()) {
                if value.is_object() {
                    return Some(value);
                }
            }
        }
    }

    scan_balanced_object(trimmed)
}

fn scan_balanced_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start..start + offset + ch.len_utf8()];
                    return serde_json::from_str::<Value>(candidate).ok();
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::registry::Tool;
    use crate::tools::types::{
        PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolResult,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct FixtureTool {
        definition: ToolDefinition,
    }

    #[async_trait]
    impl Tool for FixtureTool {
        fn definition(&self) -> ToolDefinition {
            self.definition.clone()
        }

        async fn execute(&self, _arguments: Value, _context: &ToolContext) -> ToolResult {
            ToolResult::ok(json!(null))
        }
    }

    fn fixture_registry() -> ToolRegistry {
        let registry = ToolRegistry::new();

        let mut address_props = HashMap::new();
        address_props.insert(
            "address".to_string(),
            PropertySchema::string("account address"),
        );
        address_props.insert(
            "deep_analysis".to_string(),
            PropertySchema::boolean("pattern breakdown").with_default(json!(false)),
        );
        registry
            .register(Arc::new(FixtureTool {
                definition: ToolDefinition {
                    name: "analyze_address".to_string(),
                    description: "Analyze a TON address".to_string(),
                    input_schema: ToolInputSchema {
                        schema_type: "object".to_string(),
                        properties: address_props,
                        required: vec!["address".to_string()],
                    },
                    usage_example: r#"{"address": "EQ..."}"#.to_string(),
                },
            }))
            .unwrap();

        let mut price_props = HashMap::new();
        price_props.insert(
            "tokens".to_string(),
            PropertySchema::string_array("jetton addresses"),
        );
        price_props.insert(
            "currency".to_string(),
            PropertySchema::string("currency code").with_default(json!("usd")),
        );
        registry
            .register(Arc::new(FixtureTool {
                definition: ToolDefinition {
                    name: "get_jetton_price".to_string(),
                    description: "Price jettons".to_string(),
                    input_schema: ToolInputSchema {
                        schema_type: "object".to_string(),
                        properties: price_props,
                        required: vec!["tokens".to_string()],
                    },
                    usage_example: r#"{"tokens": ["EQ..."]}"#.to_string(),
                },
            }))
            .unwrap();

        registry
    }

    // ========================================================================
    // Prompt assembly
    // ========================================================================

    #[test]
    fn test_prompt_carries_catalogue_verbatim() {
        let registry = fixture_registry();
        let catalogue = registry.catalogue();
        let prompt = build_prompt(None, &catalogue, &[], "what is my balance");

        assert!(prompt.contains(&catalogue));
        assert!(prompt.contains("User message: what is my balance"));
        assert!(!prompt.contains("[PROJECT CONTEXT]"));
        assert!(!prompt.contains("[SESSION HISTORY]"));
    }

    #[test]
    fn test_prompt_carries_context_and_history() {
        let history = vec![
            Turn::user("check EQD1234"),
            Turn::assistant("running analyze_address"),
            Turn::tool_result(r#"{"status":"ok"}"#, "inv-1"),
        ];
        let prompt = build_prompt(
            Some("Explorer for the TON network."),
            "- analyze_address: ...",
            &history,
            "and now the price",
        );

        assert!(prompt.starts_with("[PROJECT CONTEXT]\nExplorer for the TON network.\n---\n"));
        assert!(prompt.contains("[SESSION HISTORY]\nuser: check EQD1234\n"));
        assert!(prompt.contains("assistant: running analyze_address\n"));
        assert!(prompt.contains("tool-result: {\"status\":\"ok\"}\n"));
        let history_at = prompt.find("[SESSION HISTORY]").unwrap();
        let message_at = prompt.find("User message:").unwrap();
        assert!(history_at < message_at);
    }

    // ========================================================================
    // JSON extraction
    // ========================================================================

    #[test]
    fn test_extract_json_direct() {
        let value = extract_json(r#"{"action": "direct_answer", "text": "hi"}"#).unwrap();
        assert_eq!(value["action"], "direct_answer");
    }

    #[test]
    fn test_extract_json_fenced() {
        let reply = "Here you go:\n```json\n{\"action\": \"clarification\", \"question\": \"which one?\"}\n```";
        let value = extract_json(reply).unwrap();
        assert_eq!(value["question"], "which one?");
    }

    #[test]
    fn test_extract_json_embedded_in_prose() {
        let reply = r#"The right call is {"action": "tool_call", "tool": "get_ton_price", "arguments": {"currency": "usd"}} as requested."#;
        let value = extract_json(reply).unwrap();
        assert_eq!(value["tool"], "get_ton_price");
    }

    #[test]
    fn test_extract_json_handles_braces_inside_strings() {
        let reply = r#"{"action": "direct_answer", "text": "use {braces} carefully"}"#;
        let value = extract_json(reply).unwrap();
        assert_eq!(value["text"], "use {braces} carefully");
    }

    #[test]
    fn test_extract_json_none_for_plain_text() {
        assert!(extract_json("I could not decide on a tool.").is_none());
    }

    // ========================================================================
    // Interpretation
    // ========================================================================

    #[test]
    fn test_interpret_fills_declared_defaults() {
        let registry = fixture_registry();
        let intent = interpret(
            &registry,
            r#"{"action": "tool_call", "tool": "analyze_address", "arguments": {"address": "EQD1234"}}"#,
        )
        .unwrap();

        assert_eq!(
            intent,
            ResolvedIntent::ToolCall {
                tool: "analyze_address".to_string(),
                arguments: json!({"address": "EQD1234", "deep_analysis": false}),
            }
        );
    }

    #[test]
    fn test_interpret_keeps_explicit_arguments() {
        let registry = fixture_registry();
        let intent = interpret(
            &registry,
            r#"{"action": "tool_call", "tool": "get_jetton_price", "arguments": {"tokens": ["A", "B"], "currency": "eur"}}"#,
        )
        .unwrap();

        assert_eq!(
            intent,
            ResolvedIntent::ToolCall {
                tool: "get_jetton_price".to_string(),
                arguments: json!({"tokens": ["A", "B"], "currency": "eur"}),
            }
        );
    }

    #[test]
    fn test_interpret_turns_unknown_tool_into_clarification() {
        let registry = fixture_registry();
        let intent = interpret(
            &registry,
            r#"{"action": "tool_call", "tool": "frobnicate", "arguments": {}}"#,
        )
        .unwrap();
        match intent {
            ResolvedIntent::Clarification { question } => {
                assert!(question.contains("frobnicate"));
            }
            other => panic!("expected clarification, got {:?}", other),
        }
    }

    #[test]
    fn test_interpret_turns_missing_required_into_clarification() {
        let registry = fixture_registry();
        let intent = interpret(
            &registry,
            r#"{"action": "tool_call", "tool": "analyze_address", "arguments": {}}"#,
        )
        .unwrap();
        match intent {
            ResolvedIntent::Clarification { question } => {
                assert!(question.contains("analyze_address"));
                assert!(question.contains("address"));
            }
            other => panic!("expected clarification, got {:?}", other),
        }
    }

    #[test]
    fn test_interpret_turns_mistyped_arguments_into_clarification() {
        let registry = fixture_registry();
        let intent = interpret(
            &registry,
            r#"{"action": "tool_call", "tool": "get_jetton_price", "arguments": {"tokens": "not-a-list"}}"#,
        )
        .unwrap();
        match intent {
            ResolvedIntent::Clarification { question } => {
                assert!(question.contains("get_jetton_price"));
            }
            other => panic!("expected clarification, got {:?}", other),
        }
    }

    #[test]
    fn test_interpret_clarification() {
        let registry = fixture_registry();
        let intent = interpret(
            &registry,
            r#"{"action": "clarification", "question": "Which address should I analyze?"}"#,
        )
        .unwrap();
        assert!(matches!(intent, ResolvedIntent::Clarification { .. }));
    }

    #[test]
    fn test_interpret_rejects_unparseable_reply() {
        let registry = fixture_registry();
        let err = interpret(&registry, "no structured content here").unwrap_err();
        assert!(matches!(err, EngineError::ResolutionFailed(_)));

        let err = interpret(&registry, r#"{"verb": "dance"}"#).unwrap_err();
        assert!(matches!(err, EngineError::ResolutionFailed(_)));
    }
}
