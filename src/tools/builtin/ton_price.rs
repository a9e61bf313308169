use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::upstream_result;
use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolResult,
};
use crate::ton::types::TokenRate;

/// Current TON price with recent movement, from `/v2/rates`.
pub struct TonPriceTool {
    definition: ToolDefinition,
}

impl TonPriceTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "currency".to_string(),
            PropertySchema {
                schema_type: "string".to_string(),
                description: "Currency code to quote in, e.g. 'usd', 'eur', 'rub'.".to_string(),
                default: Some(json!("usd")),
                items: None,
                enum_values: None,
            },
        );

        TonPriceTool {
            definition: ToolDefinition {
                name: "get_ton_price".to_string(),
                description:
                    "Get the current TON price in the requested currency with 24h/7d/30d changes."
                        .to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec![],
                },
                usage_example: r#"{"currency": "usd"}"#.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct TonPriceParams {
    #[serde(default = "default_currency")]
    currency: String,
}

fn default_currency() -> String {
    "usd".to_string()
}

#[async_trait]
impl Tool for TonPriceTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> ToolResult {
        let params: TonPriceParams = match serde_json::from_value(arguments) {
            Ok(p) => p,
            Err(e) => {
                return ToolResult::error(
                    "invalid_arguments",
                    format!("Invalid parameters: {}", e),
                )
            }
        };

        let rates = match context
            .ton()
            .get_rates(&["ton".to_string()], &[params.currency.clone()])
            .await
        {
            Ok(rates) => rates,
            Err(e) => return upstream_result(e),
        };

        let rate = rates.rates.get("ton").cloned().unwrap_or_default();
        ToolResult::ok(shape_rate(&params.currency, &rate))
    }
}

fn shape_rate(currency: &str, rate: &TokenRate) -> Value {
    let key = currency.to_uppercase();
    json!({
        "currency": currency,
        "price": rate.prices.get(&key),
        "diff_24h": rate.diff_24h.get(&key),
        "diff_7d": rate.diff_7d.get(&key),
        "diff_30d": rate.diff_30d.get(&key),
    })
}
