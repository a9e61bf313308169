use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::upstream_result;
use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolResult,
};
use crate::ton::types::AccountEvent;

const EVENT_FETCH_LIMIT: u32 = 200;

/// Trading-activity metrics for an address, derived from its recent events.
pub struct TradingPatternsTool {
    definition: ToolDefinition,
}

impl TradingPatternsTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "address".to_string(),
            PropertySchema::string("Account address whose trading activity to analyze."),
        );
        properties.insert(
            "timeframe".to_string(),
            PropertySchema {
                schema_type: "string".to_string(),
                description: "Look-back window such as '1h', '24h', '7d' or '30d'.".to_string(),
                default: Some(json!("24h")),
                items: None,
                enum_values: None,
            },
        );

        TradingPatternsTool {
            definition: ToolDefinition {
                name: "analyze_trading_patterns".to_string(),
                description:
                    "Analyze trading behaviour of an address: swap and transfer counts, volume and activity level."
                        .to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["address".to_string()],
                },
                usage_example: r#"{"address": "EQD5vcDeRhwaLgAvralVC7sJXI-fc2aNcMUXqcx-BQ-OWi-W", "timeframe": "24h"}"#
                    .to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct TradingPatternsParams {
    address: String,
    #[serde(default = "default_timeframe")]
    timeframe: String,
}

fn default_timeframe() -> String {
    "24h".to_string()
}

#[async_trait]
impl Tool for TradingPatternsTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> ToolResult {
        let params: TradingPatternsParams = match serde_json::from_value(arguments) {
            Ok(p) => p,
            Err(e) => {
                return ToolResult::error(
                    "invalid_arguments",
                    format!("Invalid parameters: {}", e),
                )
            }
        };

        let events = match context
            .ton()
            .get_account_events(&params.address, EVENT_FETCH_LIMIT)
            .await
        {
            Ok(events) => events,
            Err(e) => return upstream_result(e),
        };

        let window = timeframe_seconds(&params.timeframe);
        let cutoff = if window > 0 {
            Utc::now().timestamp() - window
        } else {
            0
        };
        let recent: Vec<AccountEvent> = events
            .events
            .into_iter()
            .filter(|event| event.timestamp >= cutoff)
            .collect();

        let mut metrics = trading_metrics(&recent);
        metrics["address"] = json!(params.address);
        metrics["timeframe"] = json!(params.timeframe);
        ToolResult::ok(metrics)
    }
}

fn trading_metrics(events: &[AccountEvent]) -> Value {
    let total_events = events.len();
    let mut jetton_transfers: u64 = 0;
    let mut dex_swaps: u64 = 0;
    let mut volume: u64 = 0;

    for event in events {
        for action in &event.actions {
            match action.action_type.as_str() {
                "JettonTransfer" => {
                    jetton_transfers += 1;
                    if let Some(transfer) = &action.jetton_transfer {
                        volume =
                            volume.saturating_add(transfer.amount.parse::<u64>().unwrap_or(0));
                    }
                }
                "JettonSwap" => dex_swaps += 1,
                _ => {}
            }
        }
    }

    let frequency = if total_events > 0 {
        dex_swaps as f64 / total_events as f64 * 100.0
    } else {
        0.0
    };

    json!({
        "total_events": total_events,
        "jetton_transfers": jetton_transfers,
        "dex_swaps": dex_swaps,
        "trading_volume": volume,
        "is_active_trader": dex_swaps > 10,
        "trading_frequency": frequency,
    })
}

/// "24h" / "7d" style windows to seconds; 0 means no filtering.
fn timeframe_seconds(timeframe: &str) -> i64 {
    let lower = timeframe.trim().to_lowercase();
    if let Some(hours) = lower.strip_suffix('h') {
        return hours.parse::<i64>().map(|h| h * 3600).unwrap_or(0);
    }
    if let Some(days) = lower.strip_suffix('d') {
        return days.parse::<i64>().map(|d| d * 86_400).unwrap_or(0);
    }
    match lower.as_str() {
        "today" => 86_400,
        "week" => 7 * 86_400,
        "month" => 30 * 86_400,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ton::types::{EventAction, JettonTransferAction};

    fn swap_action() -> EventAction {
        EventAction {
            action_type: "JettonSwap".to_string(),
            status: Some("ok".to_string()),
            ton_transfer: None,
            jetton_transfer: None,
            jetton_swap: None,
        }
    }

    fn transfer_action(amount: &str) -> EventAction {
        EventAction {
            action_type: "JettonTransfer".to_string(),
            status: Some("ok".to_string()),
            ton_transfer: None,
            jetton_transfer: Some(JettonTransferAction {
                sender: None,
                recipient: None,
                amount: amount.to_string(),
                jetton: None,
            }),
            jetton_swap: None,
        }
    }

    fn event(actions: Vec<EventAction>) -> AccountEvent {
        AccountEvent {
            event_id: "evt".to_string(),
            timestamp: 1_700_000_000,
            actions,
            in_progress: false,
        }
    }

    #[test]
    fn test_timeframe_parsing() {
        assert_eq!(timeframe_seconds("24h"), 86_400);
        assert_eq!(timeframe_seconds("1h"), 3_600);
        assert_eq!(timeframe_seconds("7d"), 7 * 86_400);
        assert_eq!(timeframe_seconds("week"), 7 * 86_400);
        assert_eq!(timeframe_seconds("whenever"), 0);
    }

    #[test]
    fn test_metrics_count_actions_and_volume() {
        let events = vec![
            event(vec![transfer_action("1000"), swap_action()]),
            event(vec![transfer_action("500")]),
            event(vec![]),
        ];

        let metrics = trading_metrics(&events);
        assert_eq!(metrics["total_events"], 3);
        assert_eq!(metrics["jetton_transfers"], 2);
        assert_eq!(metrics["dex_swaps"], 1);
        assert_eq!(metrics["trading_volume"], 1500);
        assert_eq!(metrics["is_active_trader"], false);
    }

    #[test]
    fn test_active_trader_threshold() {
        let events: Vec<AccountEvent> =
            (0..12).map(|_| event(vec![swap_action()])).collect();
        let metrics = trading_metrics(&events);
        assert_eq!(metrics["dex_swaps"], 12);
        assert_eq!(metrics["is_active_trader"], true);
        assert_eq!(metrics["trading_frequency"], 100.0);
    }

    #[test]
    fn test_empty_events() {
        let metrics = trading_metrics(&[]);
        assert_eq!(metrics["total_events"], 0);
        assert_eq!(metrics["trading_frequency"], 0.0);
        assert_eq!(metrics["is_active_trader"], false);
    }

    #[test]
    fn test_unparseable_amount_does_not_poison_volume() {
        let events = vec![event(vec![
            transfer_action("not-a-number"),
            transfer_action("250"),
        ])];
        let metrics = trading_metrics(&events);
        assert_eq!(metrics["trading_volume"], 250);
    }
}
