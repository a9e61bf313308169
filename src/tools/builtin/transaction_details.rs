use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::{format_ton_amount, upstream_result};
use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolResult,
};
use crate::ton::types::Transaction;

/// Single transaction lookup with a short derived analysis block.
pub struct TransactionDetailsTool {
    definition: ToolDefinition,
}

impl TransactionDetailsTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "tx_hash".to_string(),
            PropertySchema::string("Transaction hash to look up."),
        );

        TransactionDetailsTool {
            definition: ToolDefinition {
                name: "get_transaction_details".to_string(),
                description:
                    "Get details for one transaction: value moved, fees, participants and direction."
                        .to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["tx_hash".to_string()],
                },
                usage_example: r#"{"tx_hash": "97264395bd65a255a429b11326166b50ec41..."}"#
                    .to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct TransactionDetailsParams {
    tx_hash: String,
}

#[async_trait]
impl Tool for TransactionDetailsTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> ToolResult {
        let params: TransactionDetailsParams = match serde_json::from_value(arguments) {
            Ok(p) => p,
            Err(e) => {
                return ToolResult::error(
                    "invalid_arguments",
                    format!("Invalid parameters: {}", e),
                )
            }
        };

        let transaction = match context.ton().get_transaction(&params.tx_hash).await {
            Ok(tx) => tx,
            Err(e) => return upstream_result(e),
        };

        ToolResult::ok(shape_transaction(&transaction))
    }
}

fn shape_transaction(tx: &Transaction) -> Value {
    let incoming_value = tx.in_msg.as_ref().map(|msg| msg.value).unwrap_or(0);
    let from = tx
        .in_msg
        .as_ref()
        .and_then(|msg| msg.source.as_ref())
        .map(|account| account.address.clone());
    let to = tx
        .in_msg
        .as_ref()
        .and_then(|msg| msg.destination.as_ref())
        .map(|account| account.address.clone())
        .or_else(|| tx.account.as_ref().map(|account| account.address.clone()));

    json!({
        "transaction": {
            "hash": tx.hash,
            "utime": tx.utime,
            "success": tx.success,
            "total_fees": tx.total_fees,
        },
        "analysis": {
            "type": classify_transaction(tx),
            "value_transfer": format_ton_amount(incoming_value),
            "gas_fees": format_ton_amount(tx.total_fees),
            "participants": {
                "from": from,
                "to": to,
            },
        },
    })
}

fn classify_transaction(tx: &Transaction) -> &'static str {
    if !tx.out_msgs.is_empty() {
        "outgoing_transfer"
    } else if tx.in_msg.as_ref().map(|msg| msg.value > 0).unwrap_or(false) {
        "incoming_transfer"
    } else {
        "contract_interaction"
    }
}
