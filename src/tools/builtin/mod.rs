pub mod analyze_address;
pub mod hot_trends;
pub mod jetton_price;
pub mod ton_price;
pub mod trading_patterns;
pub mod transaction_details;

use std::sync::Arc;

use crate::errors::EngineError;
use crate::tools::registry::{RegistryError, ToolRegistry};
use crate::tools::types::ToolResult;

pub use analyze_address::AnalyzeAddressTool;
pub use hot_trends::HotTrendsTool;
pub use jetton_price::JettonPriceTool;
pub use ton_price::TonPriceTool;
pub use trading_patterns::TradingPatternsTool;
pub use transaction_details::TransactionDetailsTool;

/// Register every built-in tool. The order here is the catalogue order
/// callers and prompts see.
pub fn register_all(registry: &ToolRegistry) -> Result<(), RegistryError> {
    registry.register(Arc::new(AnalyzeAddressTool::new()))?;
    registry.register(Arc::new(TransactionDetailsTool::new()))?;
    registry.register(Arc::new(HotTrendsTool::new()))?;
    registry.register(Arc::new(TradingPatternsTool::new()))?;
    registry.register(Arc::new(TonPriceTool::new()))?;
    registry.register(Arc::new(JettonPriceTool::new()))?;
    Ok(())
}

/// Map an upstream client failure into the result wire shape, keeping the
/// retry hint for the dispatcher.
pub(crate) fn upstream_result(error: EngineError) -> ToolResult {
    if error.retryable() {
        ToolResult::retryable_error(error.kind(), error.to_string())
    } else {
        ToolResult::error(error.kind(), error.to_string())
    }
}

/// Render a nanoton amount for humans.
pub(crate) fn format_ton_amount(nanotons: i64) -> String {
    if nanotons == 0 {
        return "0 TON".to_string();
    }
    let ton = nanotons as f64 / 1e9;
    let magnitude = ton.abs();
    if magnitude < 0.001 {
        format!("{:.9} TON", ton)
    } else if magnitude < 1.0 {
        format!("{:.6} TON", ton)
    } else if magnitude < 1000.0 {
        format!("{:.3} TON", ton)
    } else {
        format!("{} TON", group_thousands(ton))
    }
}

fn group_thousands(value: f64) -> String {
    let formatted = format!("{:.2}", value);
    let (number, fraction) = formatted.split_once('.').unwrap_or((formatted.as_str(), ""));
    let (sign, digits) = match number.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", number),
    };

    let mut grouped = String::new();
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}{}.{}", sign, grouped, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_order_matches_catalogue() {
        let registry = ToolRegistry::new();
        register_all(&registry).unwrap();

        let names: Vec<String> = registry.list().into_iter().map(|def| def.name).collect();
        assert_eq!(
            names,
            vec![
                "analyze_address",
                "get_transaction_details",
                "find_hot_trends",
                "analyze_trading_patterns",
                "get_ton_price",
                "get_jetton_price",
            ]
        );
    }

    #[test]
    fn test_register_all_twice_fails() {
        let registry = ToolRegistry::new();
        register_all(&registry).unwrap();
        assert!(register_all(&registry).is_err());
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn test_upstream_result_keeps_retry_hint() {
        let retryable = upstream_result(EngineError::upstream("rate limited", true));
        assert!(retryable.retryable);
        assert_eq!(retryable.error.as_ref().unwrap().kind, "upstream_failure");

        let terminal = upstream_result(EngineError::upstream("not found", false));
        assert!(!terminal.retryable);
    }

    #[test]
    fn test_format_ton_amount() {
        assert_eq!(format_ton_amount(0), "0 TON");
        assert_eq!(format_ton_amount(500), "0.000000500 TON");
        assert_eq!(format_ton_amount(250_000_000), "0.250000 TON");
        assert_eq!(format_ton_amount(2_500_000_000), "2.500 TON");
        assert_eq!(format_ton_amount(1_234_500_000_000), "1,234.50 TON");
    }

    #[test]
    fn test_group_thousands_negative() {
        assert_eq!(group_thousands(-1234567.891), "-1,234,567.89");
    }
}
