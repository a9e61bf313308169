use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

use super::upstream_result;
use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolResult,
};
use crate::ton::types::{AccountEvent, JettonBalance, TokenRate};

const EVENT_FETCH_LIMIT: u32 = 50;

/// Aggregated account picture: balance, holdings, activity and a USD
/// valuation. `deep_analysis` adds a transaction-pattern breakdown.
pub struct AnalyzeAddressTool {
    definition: ToolDefinition,
}

impl AnalyzeAddressTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "address".to_string(),
            PropertySchema::string("TON account address to analyze."),
        );
        properties.insert(
            "deep_analysis".to_string(),
            PropertySchema {
                schema_type: "boolean".to_string(),
                description: "Include a transaction-pattern breakdown.".to_string(),
                default: Some(json!(false)),
                items: None,
                enum_values: None,
            },
        );

        AnalyzeAddressTool {
            definition: ToolDefinition {
                name: "analyze_address".to_string(),
                description:
                    "Analyze a TON address: balance, status, jetton holdings, recent activity and USD value."
                        .to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["address".to_string()],
                },
                usage_example: r#"{"address": "EQD5vcDeRhwaLgAvralVC7sJXI-fc2aNcMUXqcx-BQ-OWi-W"}"#
                    .to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeAddressParams {
    address: String,
    #[serde(default)]
    deep_analysis: bool,
}

#[async_trait]
impl Tool for AnalyzeAddressTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> ToolResult {
        let params: AnalyzeAddressParams = match serde_json::from_value(arguments) {
            Ok(p) => p,
            Err(e) => {
                return ToolResult::error(
                    "invalid_arguments",
                    format!("Invalid parameters: {}", e),
                )
            }
        };

        let account = match context.ton().get_account(&params.address).await {
            Ok(account) => account,
            Err(e) => return upstream_result(e),
        };
        let jettons = match context.ton().get_account_jettons(&params.address).await {
            Ok(jettons) => jettons,
            Err(e) => return upstream_result(e),
        };
        let events = match context
            .ton()
            .get_account_events(&params.address, EVENT_FETCH_LIMIT)
            .await
        {
            Ok(events) => events,
            Err(e) => return upstream_result(e),
        };

        // Valuation is best effort: a rates outage degrades the answer to
        // balances without USD figures instead of failing the whole call.
        let ton_price = match context
            .ton()
            .get_rates(&["ton".to_string()], &["usd".to_string()])
            .await
        {
            Ok(rates) => rates
                .rates
                .get("ton")
                .and_then(|rate| rate.prices.get("USD"))
                .cloned(),
            Err(e) => {
                log::warn!("[TOOLS] TON price unavailable for valuation: {}", e);
                None
            }
        };

        let jetton_addresses: Vec<String> = jettons
            .balances
            .iter()
            .map(|balance| balance.jetton.address.clone())
            .collect();
        let jetton_rates = if jetton_addresses.is_empty() {
            HashMap::new()
        } else {
            match context
                .ton()
                .get_rates(&jetton_addresses, &["usd".to_string()])
                .await
            {
                Ok(rates) => rates.rates,
                Err(e) => {
                    log::warn!("[TOOLS] Jetton rates unavailable for valuation: {}", e);
                    HashMap::new()
                }
            }
        };

        let balance_ton = account.balance as f64 / 1e9;
        let ton_usd = ton_price.map(|price| balance_ton * price).unwrap_or(0.0);
        let (jetton_usd, holdings) = jetton_valuations(&jettons.balances, &jetton_rates, "USD");

        let mut result = json!({
            "address": params.address,
            "status": account.status,
            "name": account.name,
            "interfaces": account.interfaces,
            "is_scam": account.is_scam,
            "balance_ton": balance_ton,
            "jetton_balances": holdings,
            "transaction_count": events.events.len(),
            "ton_usd_value": ton_usd,
            "jetton_usd_value": jetton_usd,
            "wallet_value_usd": ton_usd + jetton_usd,
        });

        if params.deep_analysis {
            result["analysis"] = event_patterns(&params.address, &events.events);
        }

        ToolResult::ok(result)
    }
}

/// Per-jetton balances with USD values where a rate is known, plus the
/// portfolio total.
fn jetton_valuations(
    balances: &[JettonBalance],
    rates: &HashMap<String, TokenRate>,
    currency_key: &str,
) -> (f64, Vec<Value>) {
    let mut total = 0.0;
    let mut holdings = Vec::with_capacity(balances.len());

    for entry in balances {
        let units = entry.balance.parse::<f64>().unwrap_or(0.0)
            / 10f64.powi(entry.jetton.decimals as i32);
        let price = rates
            .get(&entry.jetton.address)
            .and_then(|rate| rate.prices.get(currency_key))
            .cloned();
        let usd_value = price.map(|price| units * price).unwrap_or(0.0);
        total += usd_value;

        holdings.push(json!({
            "symbol": entry.jetton.symbol,
            "address": entry.jetton.address,
            "balance": units,
            "usd_value": usd_value,
        }));
    }

    (total, holdings)
}

/// Direction counts, activity bounds and per-action-type totals. Events
/// arrive newest first, so bounds come off the list ends.
fn event_patterns(address: &str, events: &[AccountEvent]) -> Value {
    let mut incoming = 0u64;
    let mut outgoing = 0u64;
    let mut action_types: BTreeMap<String, u64> = BTreeMap::new();

    for event in events {
        let mut received = false;
        let mut sent = false;
        for action in &event.actions {
            *action_types.entry(action.action_type.clone()).or_insert(0) += 1;

            let (sender, recipient) = match (&action.ton_transfer, &action.jetton_transfer) {
                (Some(transfer), _) => (transfer.sender.as_ref(), transfer.recipient.as_ref()),
                (None, Some(transfer)) => (transfer.sender.as_ref(), transfer.recipient.as_ref()),
                _ => (None, None),
            };
            if recipient.map(|account| account.address == address).unwrap_or(false) {
                received = true;
            }
            if sender.map(|account| account.address == address).unwrap_or(false) {
                sent = true;
            }
        }
        if received {
            incoming += 1;
        }
        if sent {
            outgoing += 1;
        }
    }

    json!({
        "total_transactions": events.len(),
        "incoming_transactions": incoming,
        "outgoing_transactions": outgoing,
        "first_transaction_time": events.last().map(|event| event.timestamp),
        "last_transaction_time": events.first().map(|event| event.timestamp),
        "action_types": action_types,
    })
}
