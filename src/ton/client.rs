use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::types::{
    Account, AccountEvents, JettonBalances, JettonsPage, RatesResponse, Transaction,
};
use crate::errors::EngineError;

/// Client for the TON HTTP API (tonapi.io v2 shape).
///
/// All calls go through the shared connection pool, carry the optional
/// Bearer token, and are capped by one process-wide semaphore so a burst of
/// sessions cannot stampede the upstream.
pub struct TonClient {
    base_url: String,
    auth_headers: header::HeaderMap,
    client: Client,
    limiter: Semaphore,
    timeout: Duration,
}

impl TonClient {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout_secs: u64,
        max_concurrent: usize,
    ) -> Self {
        let mut auth_headers = header::HeaderMap::new();
        auth_headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(key) = api_key {
            match header::HeaderValue::from_str(&format!("Bearer {}", key)) {
                Ok(value) => {
                    auth_headers.insert(header::AUTHORIZATION, value);
                }
                Err(e) => log::warn!("[TON] Ignoring malformed API key: {}", e),
            }
        }

        TonClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_headers,
            client: crate::http::shared_client().clone(),
            limiter: Semaphore::new(max_concurrent),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub async fn get_account(&self, address: &str) -> Result<Account, EngineError> {
        self.get_json(&format!("/v2/accounts/{}", urlencoding::encode(address)))
            .await
    }

    pub async fn get_account_events(
        &self,
        address: &str,
        limit: u32,
    ) -> Result<AccountEvents, EngineError> {
        self.get_json(&format!(
            "/v2/accounts/{}/events?limit={}",
            urlencoding::encode(address),
            limit
        ))
        .await
    }

    pub async fn get_account_jettons(&self, address: &str) -> Result<JettonBalances, EngineError> {
        self.get_json(&format!(
            "/v2/accounts/{}/jettons",
            urlencoding::encode(address)
        ))
        .await
    }

    pub async fn get_transaction(&self, tx_hash: &str) -> Result<Transaction, EngineError> {
        self.get_json(&format!(
            "/v2/blockchain/transactions/{}",
            urlencoding::encode(tx_hash)
        ))
        .await
    }

    pub async fn get_jettons(&self, limit: u32) -> Result<JettonsPage, EngineError> {
        self.get_json(&format!("/v2/jettons?limit={}", limit)).await
    }

    pub async fn get_rates(
        &self,
        tokens: &[String],
        currencies: &[String],
    ) -> Result<RatesResponse, EngineError> {
        self.get_json(&rates_query(tokens, currencies)).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, EngineError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| EngineError::upstream("TON client is shutting down", false))?;

        let url = format!("{}{}", self.base_url, path);
        log::debug!("[TON] GET {}", url);

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                EngineError::upstream(format!("TON API request failed: {}", e), true)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("TON API returned {}: {}", status, truncate(&body, 200));
            return Err(EngineError::upstream(
                message,
                retryable_status(status.as_u16()),
            ));
        }

        response.json::<T>().await.map_err(|e| {
            EngineError::upstream(format!("Failed to parse TON API response: {}", e), false)
        })
    }
}

/// 429 and any 5xx are worth retrying; other 4xx are caller mistakes.
fn retryable_status(code: u16) -> bool {
    code == 429 || code >= 500
}

fn rates_query(tokens: &[String], currencies: &[String]) -> String {
    format!(
        "/v2/rates?tokens={}&currencies={}",
        urlencoding::encode(&tokens.join(",")),
        urlencoding::encode(&currencies.join(","))
    )
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_status_classification() {
        assert!(retryable_status(429));
        assert!(retryable_status(500));
        assert!(retryable_status(503));
        assert!(!retryable_status(404));
        assert!(!retryable_status(400));
        assert!(!retryable_status(401));
    }

    #[test]
    fn test_rates_query_encoding() {
        let query = rates_query(
            &["ton".to_string(), "0:abc".to_string()],
            &["usd".to_string()],
        );
        assert_eq!(query, "/v2/rates?tokens=ton%2C0%3Aabc&currencies=usd");
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let client = TonClient::new("https://tonapi.io/".to_string(), None, 5, 2);
        assert_eq!(client.base_url, "https://tonapi.io");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
    }
}
