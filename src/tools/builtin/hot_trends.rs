use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::upstream_result;
use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolResult,
};
use crate::ton::types::{JettonsPage, TokenRate};

const CANDIDATE_LIMIT: u32 = 50;
const TREND_LIMIT: usize = 10;

/// Trending jettons ranked by rate movement over the requested window.
pub struct HotTrendsTool {
    definition: ToolDefinition,
}

impl HotTrendsTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "timeframe".to_string(),
            PropertySchema {
                schema_type: "string".to_string(),
                description: "Movement window. '7d' and '30d' use those figures; any other value, including the default '1h', uses the 24h movement."
                    .to_string(),
                default: Some(json!("1h")),
                items: None,
                enum_values: None,
            },
        );
        properties.insert(
            "category".to_string(),
            PropertySchema {
                schema_type: "string".to_string(),
                description: "What to rank. Only 'tokens' is served.".to_string(),
                default: Some(json!("tokens")),
                items: None,
                enum_values: Some(vec![
                    "tokens".to_string(),
                    "pools".to_string(),
                    "accounts".to_string(),
                    "all".to_string(),
                ]),
            },
        );

        HotTrendsTool {
            definition: ToolDefinition {
                name: "find_hot_trends".to_string(),
                description: "Find trending jettons on TON ranked by recent price movement."
                    .to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec![],
                },
                usage_example: r#"{"timeframe": "24h", "category": "tokens"}"#.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct HotTrendsParams {
    #[serde(default = "default_timeframe")]
    timeframe: String,
    #[serde(default = "default_category")]
    category: String,
}

fn default_timeframe() -> String {
    "1h".to_string()
}

fn default_category() -> String {
    "tokens".to_string()
}

#[async_trait]
impl Tool for HotTrendsTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> ToolResult {
        let params: HotTrendsParams = match serde_json::from_value(arguments) {
            Ok(p) => p,
            Err(e) => {
                return ToolResult::error(
                    "invalid_arguments",
                    format!("Invalid parameters: {}", e),
                )
            }
        };

        if params.category != "tokens" && params.category != "all" {
            return ToolResult::error(
                "invalid_arguments",
                format!(
                    "trend data for '{}' is not available; only 'tokens' is served",
                    params.category
                ),
            );
        }

        let page = match context.ton().get_jettons(CANDIDATE_LIMIT).await {
            Ok(page) => page,
            Err(e) => return upstream_result(e),
        };

        let addresses: Vec<String> = page
            .jettons
            .iter()
            .map(|listing| listing.metadata.address.clone())
            .collect();
        if addresses.is_empty() {
            return ToolResult::ok(json!({"timeframe": params.timeframe, "tokens": []}));
        }

        let rates = match context
            .ton()
            .get_rates(&addresses, &["usd".to_string()])
            .await
        {
            Ok(rates) => rates,
            Err(e) => return upstream_result(e),
        };

        let tokens = rank_by_movement(&page, &rates.rates, &params.timeframe);
        ToolResult::ok(json!({
            "timeframe": params.timeframe,
            "tokens": tokens,
        }))
    }
}

fn rank_by_movement(
    page: &JettonsPage,
    rates: &HashMap<String, TokenRate>,
    timeframe: &str,
) -> Vec<Value> {
    let mut ranked: Vec<(f64, Value)> = page
        .jettons
        .iter()
        .map(|listing| {
            let rate = rates.get(&listing.metadata.address);
            let change = rate
                .and_then(|rate| diff_window(rate, timeframe).get("USD"))
                .cloned();
            let movement = change.as_deref().and_then(parse_percent).unwrap_or(0.0);
            let price = rate.and_then(|rate| rate.prices.get("USD")).cloned();
            (
                movement,
                json!({
                    "symbol": listing.metadata.symbol,
                    "name": listing.metadata.name,
                    "address": listing.metadata.address,
                    "holders_count": listing.holders_count,
                    "price_usd": price,
                    "change": change,
                }),
            )
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.0.abs()
            .partial_cmp(&a.0.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
        .into_iter()
        .take(TREND_LIMIT)
        .map(|(_, token)| token)
        .collect()
}

/// The rates endpoint only reports 24h/7d/30d windows; anything shorter
/// rides on the 24h figure.
fn diff_window<'a>(rate: &'a TokenRate, timeframe: &str) -> &'a HashMap<String, String> {
    match timeframe {
        "7d" => &rate.diff_7d,
        "30d" => &rate.diff_30d,
        _ => &rate.diff_24h,
    }
}

fn parse_percent(text: &str) -> Option<f64> {
    text.trim()
        .trim_end_matches('%')
        .trim_start_matches('+')
        .parse::<f64>()
        .ok()
}
