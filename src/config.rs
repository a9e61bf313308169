use std::env;

#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Static API token checked on every authenticated endpoint.
    pub api_token: String,
    pub ton_api_url: String,
    pub ton_api_key: Option<String>,
    pub ton_timeout_secs: u64,
    pub ton_max_concurrent: usize,
    pub claude_api_key: String,
    pub claude_model: String,
    pub claude_fallback_model: String,
    pub claude_timeout_secs: u64,
    pub claude_max_concurrent: usize,
    /// Deadline for one tool invocation end to end, retries included.
    pub tool_deadline_secs: u64,
    pub session_idle_secs: u64,
    pub project_context_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .expect("PORT must be a valid number"),
            api_token: env::var("TON_AGENT_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            ton_api_url: env::var("TON_API_URL")
                .unwrap_or_else(|_| "https://tonapi.io".to_string()),
            ton_api_key: env::var("TON_API_KEY").ok(),
            ton_timeout_secs: env::var("TON_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("TON_TIMEOUT_SECS must be a valid number"),
            ton_max_concurrent: env::var("TON_MAX_CONCURRENT")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .expect("TON_MAX_CONCURRENT must be a valid number"),
            claude_api_key: env::var("CLAUDE_API_KEY").expect("CLAUDE_API_KEY must be set"),
            claude_model: env::var("CLAUDE_MODEL")
                .unwrap_or_else(|_| "claude-3-7-sonnet-latest".to_string()),
            claude_fallback_model: env::var("CLAUDE_FALLBACK_MODEL")
                .unwrap_or_else(|_| "claude-3-5-sonnet-20241022".to_string()),
            claude_timeout_secs: env::var("CLAUDE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .expect("CLAUDE_TIMEOUT_SECS must be a valid number"),
            claude_max_concurrent: env::var("CLAUDE_MAX_CONCURRENT")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .expect("CLAUDE_MAX_CONCURRENT must be a valid number"),
            tool_deadline_secs: env::var("TOOL_DEADLINE_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .expect("TOOL_DEADLINE_SECS must be a valid number"),
            session_idle_secs: env::var("SESSION_IDLE_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .expect("SESSION_IDLE_SECS must be a valid number"),
            project_context_path: env::var("PROJECT_CONTEXT_PATH").ok(),
        }
    }

    /// Fixed configuration for tests, independent of the environment.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            api_token: "changeme".to_string(),
            ton_api_url: "https://tonapi.io".to_string(),
            ton_api_key: None,
            ton_timeout_secs: 30,
            ton_max_concurrent: 8,
            claude_api_key: "test-key".to_string(),
            claude_model: "claude-3-7-sonnet-latest".to_string(),
            claude_fallback_model: "claude-3-5-sonnet-20241022".to_string(),
            claude_timeout_secs: 60,
            claude_max_concurrent: 2,
            tool_deadline_secs: 60,
            session_idle_secs: 3600,
            project_context_path: None,
        }
    }

    /// Project description prepended to every reasoning prompt, when the
    /// operator supplies one on disk.
    pub fn load_project_context(&self) -> Option<String> {
        let path = self.project_context_path.as_ref()?;
        match std::fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(e) => {
                log::warn!("[CONFIG] Could not read project context {}: {}", path, e);
                None
            }
        }
    }
}
