use serde::Deserialize;
use std::collections::HashMap;

/// Account summary from `/v2/accounts/{address}`. Balance is in nanotons.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub address: String,
    #[serde(default)]
    pub balance: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_scam: bool,
    #[serde(default)]
    pub last_activity: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountEvents {
    #[serde(default)]
    pub events: Vec<AccountEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountEvent {
    pub event_id: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub actions: Vec<EventAction>,
    #[serde(default)]
    pub in_progress: bool,
}

/// One action inside an account event. The payload field matching
/// `action_type` is populated, the rest stay `None`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventAction {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "TonTransfer", default)]
    pub ton_transfer: Option<TonTransferAction>,
    #[serde(rename = "JettonTransfer", default)]
    pub jetton_transfer: Option<JettonTransferAction>,
    #[serde(rename = "JettonSwap", default)]
    pub jetton_swap: Option<JettonSwapAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TonTransferAction {
    #[serde(default)]
    pub sender: Option<AccountRef>,
    #[serde(default)]
    pub recipient: Option<AccountRef>,
    #[serde(default)]
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JettonTransferAction {
    #[serde(default)]
    pub sender: Option<AccountRef>,
    #[serde(default)]
    pub recipient: Option<AccountRef>,
    /// Raw amount in the jetton's own decimals, as the API sends it.
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub jetton: Option<JettonInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JettonSwapAction {
    #[serde(default)]
    pub amount_in: String,
    #[serde(default)]
    pub amount_out: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountRef {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JettonBalances {
    #[serde(default)]
    pub balances: Vec<JettonBalance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JettonBalance {
    #[serde(default)]
    pub balance: String,
    pub jetton: JettonInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JettonInfo {
    pub address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

fn default_decimals() -> u32 {
    9
}

/// Transaction from `/v2/blockchain/transactions/{hash}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    pub hash: String,
    #[serde(default)]
    pub utime: i64,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub total_fees: i64,
    #[serde(default)]
    pub account: Option<AccountRef>,
    #[serde(default)]
    pub in_msg: Option<TxMessage>,
    #[serde(default)]
    pub out_msgs: Vec<TxMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxMessage {
    #[serde(default)]
    pub value: i64,
    #[serde(default)]
    pub source: Option<AccountRef>,
    #[serde(default)]
    pub destination: Option<AccountRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JettonsPage {
    #[serde(default)]
    pub jettons: Vec<JettonListing>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JettonListing {
    pub metadata: JettonMetadata,
    #[serde(default)]
    pub verification: Option<String>,
    #[serde(default)]
    pub holders_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JettonMetadata {
    pub address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
}

/// `/v2/rates` response. Keys of `rates` echo the requested token ids;
/// inner maps are keyed by uppercased currency code.
#[derive(Debug, Clone, Deserialize)]
pub struct RatesResponse {
    #[serde(default)]
    pub rates: HashMap<String, TokenRate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRate {
    #[serde(default)]
    pub prices: HashMap<String, f64>,
    #[serde(default)]
    pub diff_24h: HashMap<String, String>,
    #[serde(default)]
    pub diff_7d: HashMap<String, String>,
    #[serde(default)]
    pub diff_30d: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_deserializes_with_missing_optionals() {
        let account: Account = serde_json::from_str(
            r#"{"address": "0:abc", "balance": 1500000000, "status": "active"}"#,
        )
        .unwrap();
        assert_eq!(account.balance, 1_500_000_000);
        assert!(account.interfaces.is_empty());
        assert!(!account.is_scam);
    }

    #[test]
    fn test_event_action_payload_matches_type() {
        let action: EventAction = serde_json::from_str(
            r#"{
                "type": "JettonTransfer",
                "status": "ok",
                "JettonTransfer": {
                    "amount": "250000",
                    "jetton": {"address": "0:jet", "symbol": "SCALE", "decimals": 9}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(action.action_type, "JettonTransfer");
        let transfer = action.jetton_transfer.unwrap();
        assert_eq!(transfer.amount, "250000");
        assert!(action.ton_transfer.is_none());
    }

    #[test]
    fn test_rates_response_shape() {
        let rates: RatesResponse = serde_json::from_str(
            r#"{
                "rates": {
                    "ton": {
                        "prices": {"USD": 2.41},
                        "diff_24h": {"USD": "-1.2%"}
                    }
                }
            }"#,
        )
        .unwrap();
        let ton = rates.rates.get("ton").unwrap();
        assert_eq!(ton.prices.get("USD"), Some(&2.41));
        assert_eq!(ton.diff_24h.get("USD").unwrap(), "-1.2%");
        assert!(ton.diff_7d.is_empty());
    }
}
