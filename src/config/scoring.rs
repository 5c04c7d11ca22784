// src/config/scoring.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_daily_limit() -> u32 {
    200
}
fn default_max_retries() -> u32 {
    2
}
fn default_base_delay_secs() -> u64 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// "openai" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Real calls per UTC day; 0 = unlimited.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    /// Retries on a transient rate limit (attempts = retries + 1).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry.
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: default_api_key(),
            daily_limit: default_daily_limit(),
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay_secs(),
        }
    }
}

impl ScoringConfig {
    pub(crate) fn sanitized(mut self) -> Self {
        self.provider = self.provider.trim().to_lowercase();
        if self.model.trim().is_empty() {
            self.model = default_model();
        }
        self.max_retries = self.max_retries.min(10);
        self
    }

    /// Resolve the API key, reading the environment when configured as "ENV".
    pub fn resolve_api_key(&self) -> anyhow::Result<String> {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            return match self.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var")),
                "mock" => Ok(String::new()),
                other => anyhow::bail!("Unsupported scoring provider in config: {other}"),
            };
        }
        Ok(self.api_key.trim().to_string())
    }
}
