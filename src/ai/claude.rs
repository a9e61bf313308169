use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::errors::EngineError;

const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const MAX_TOKENS: u32 = 1024;
// One retry per model on transient failures, then the fallback model gets
// the same treatment.
const MAX_RETRIES: u32 = 1;
const RETRY_DELAY_MS: u64 = 2000;

/// Thin client for the Anthropic messages API.
///
/// The primary model is tried first; when it is overloaded the fallback
/// model takes over. A process-wide semaphore caps concurrent reasoning
/// calls.
pub struct ClaudeClient {
    client: Client,
    auth_headers: header::HeaderMap,
    endpoint: String,
    model: String,
    fallback_model: String,
    timeout: Duration,
    limiter: Semaphore,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: Vec<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl ClaudeClient {
    pub fn new(
        api_key: &str,
        model: String,
        fallback_model: String,
        timeout_secs: u64,
        max_concurrent: usize,
    ) -> Result<Self, String> {
        let mut auth_headers = header::HeaderMap::new();
        auth_headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let auth_value = header::HeaderValue::from_str(api_key)
            .map_err(|e| format!("Invalid API key format: {}", e))?;
        auth_headers.insert("x-api-key", auth_value);
        auth_headers.insert(
            "anthropic-version",
            header::HeaderValue::from_static("2023-06-01"),
        );

        Ok(ClaudeClient {
            client: crate::http::shared_client().clone(),
            auth_headers,
            endpoint: ANTHROPIC_ENDPOINT.to_string(),
            model,
            fallback_model,
            timeout: Duration::from_secs(timeout_secs),
            limiter: Semaphore::new(max_concurrent),
        })
    }

    /// Client pointed at a stand-in endpoint, for exercising failure paths.
    #[cfg(test)]
    pub(crate) fn with_endpoint(
        api_key: &str,
        endpoint: String,
        timeout_secs: u64,
    ) -> Result<Self, String> {
        let mut client = Self::new(
            api_key,
            "claude-3-7-sonnet-latest".to_string(),
            "claude-3-5-sonnet-20241022".to_string(),
            timeout_secs,
            1,
        )?;
        client.endpoint = endpoint;
        Ok(client)
    }

    /// Run one completion and return the concatenated text blocks.
    pub async fn complete(&self, prompt: &str) -> Result<String, EngineError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| EngineError::upstream("reasoning client is shutting down", false))?;

        let models = [self.model.as_str(), self.fallback_model.as_str()];
        let mut last_error = EngineError::upstream("no reasoning model attempted", true);

        for model in models {
            for attempt in 0..=MAX_RETRIES {
                if attempt > 0 {
                    log::warn!(
                        "[CLAUDE] Retry attempt {}/{} on {} after {}ms",
                        attempt,
                        MAX_RETRIES,
                        model,
                        RETRY_DELAY_MS
                    );
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
                }

                match self.try_model(model, prompt).await {
                    Ok(text) => return Ok(text),
                    Err(e) if e.retryable() => {
                        log::warn!("[CLAUDE] Transient failure on {}: {}", model, e);
                        last_error = e;
                    }
                    Err(e) => return Err(e),
                }
            }
            log::warn!("[CLAUDE] Model {} exhausted its retries, moving on", model);
        }

        Err(last_error)
    }

    async fn try_model(&self, model: &str, prompt: &str) -> Result<String, EngineError> {
        let request = CompletionRequest {
            model,
            max_tokens: MAX_TOKENS,
            messages: vec![RequestMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.auth_headers.clone())
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                EngineError::upstream(format!("Claude API request failed: {}", e), true)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(parsed) => format!("Claude API error: {}", parsed.error.message),
                Err(_) => format!("Claude API returned {}: {}", status, body),
            };
            return Err(EngineError::upstream(
                message,
                overloaded_status(status.as_u16()),
            ));
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            EngineError::upstream(format!("Failed to parse Claude response: {}", e), false)
        })?;

        let text: String = completion
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if text.is_empty() {
            return Err(EngineError::upstream(
                "Claude API returned no text content",
                false,
            ));
        }
        Ok(text)
    }
}

fn overloaded_status(code: u16) -> bool {
    matches!(code, 429 | 503 | 529)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overloaded_status_classification() {
        assert!(overloaded_status(529));
        assert!(overloaded_status(429));
        assert!(overloaded_status(503));
        assert!(!overloaded_status(400));
        assert!(!overloaded_status(401));
        assert!(!overloaded_status(500));
    }

    #[test]
    fn test_completion_request_shape() {
        let request = CompletionRequest {
            model: "claude-3-7-sonnet-latest",
            max_tokens: MAX_TOKENS,
            messages: vec![RequestMessage {
                role: "user",
                content: "hello",
            }],
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["model"], "claude-3-7-sonnet-latest");
        assert_eq!(wire["max_tokens"], 1024);
        assert_eq!(wire["messages"][0]["role"], "user");
        assert_eq!(wire["messages"][0]["content"], "hello");
    }

    #[test]
    fn test_response_text_extraction_shape() {
        let completion: CompletionResponse = serde_json::from_str(
            r#"{"content": [
                {"type": "text", "text": "part one "},
                {"type": "tool_use"},
                {"type": "text", "text": "part two"}
            ]}"#,
        )
        .unwrap();
        let text: String = completion
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();
        assert_eq!(text, "part one part two");
    }

    #[test]
    fn test_invalid_api_key_rejected() {
        let result = ClaudeClient::new(
            "bad\nkey",
            "claude-3-7-sonnet-latest".to_string(),
            "claude-3-5-sonnet-20241022".to_string(),
            60,
            2,
        );
        assert!(result.is_err());
    }
}
