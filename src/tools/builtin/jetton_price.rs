use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use super::upstream_result;
use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolResult,
};
use crate::ton::types::TokenRate;

/// Prices for a list of jetton master contracts, from `/v2/rates`.
pub struct JettonPriceTool {
    definition: ToolDefinition,
}

impl JettonPriceTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "tokens".to_string(),
            PropertySchema {
                schema_type: "array".to_string(),
                description: "Jetton master contract addresses or known token symbols to price."
                    .to_string(),
                default: None,
                items: Some(Box::new(PropertySchema::string("token address or symbol"))),
                enum_values: None,
            },
        );
        properties.insert(
            "currency".to_string(),
            PropertySchema {
                schema_type: "string".to_string(),
                description: "Currency code to quote in, e.g. 'usd', 'eur'.".to_string(),
                default: Some(json!("usd")),
                items: None,
                enum_values: None,
            },
        );

        JettonPriceTool {
            definition: ToolDefinition {
                name: "get_jetton_price".to_string(),
                description:
                    "Get current prices and recent changes for the given jetton tokens (not TON itself)."
                        .to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["tokens".to_string()],
                },
                usage_example: r#"{"tokens": ["EQB...scale"], "currency": "usd"}"#.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct JettonPriceParams {
    tokens: Vec<String>,
    #[serde(default = "default_currency")]
    currency: String,
}

fn default_currency() -> String {
    "usd".to_string()
}

#[async_trait]
impl Tool for JettonPriceTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> ToolResult {
        let params: JettonPriceParams = match serde_json::from_value(arguments) {
            Ok(p) => p,
            Err(e) => {
                return ToolResult::error(
                    "invalid_arguments",
                    format!("Invalid parameters: {}", e),
                )
            }
        };

        let tokens = drop_native_ton(&params.tokens);
        if tokens.is_empty() {
            return ToolResult::error(
                "invalid_arguments",
                "no jetton tokens specified; 'ton' itself is priced by get_ton_price",
            );
        }

        let rates = match context
            .ton()
            .get_rates(&tokens, &[params.currency.clone()])
            .await
        {
            Ok(rates) => rates,
            Err(e) => return upstream_result(e),
        };

        ToolResult::ok(shape_rates(&params.currency, &rates.rates))
    }
}

/// The rates endpoint treats "ton" as the native coin, which this tool
/// deliberately does not serve.
fn drop_native_ton(tokens: &[String]) -> Vec<String> {
    tokens
        .iter()
        .filter(|token| !token.eq_ignore_ascii_case("ton"))
        .cloned()
        .collect()
}

fn shape_rates(currency: &str, rates: &HashMap<String, TokenRate>) -> Value {
    let key = currency.to_uppercase();
    let mut shaped = Map::new();
    for (token, rate) in rates {
        shaped.insert(
            token.clone(),
            json!({
                "price": rate.prices.get(&key),
                "diff_24h": rate.diff_24h.get(&key),
                "diff_7d": rate.diff_7d.get(&key),
                "diff_30d": rate.diff_30d.get(&key),
            }),
        );
    }
    Value::Object(shaped)
}
