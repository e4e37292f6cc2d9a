// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const ENV_AI_CONFIG_PATH: &str = "AI_CONFIG_PATH";
pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";
pub const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_AI_TEST_MODE: &str = "AI_TEST_MODE";

fn default_enabled() -> bool {
    true
}
fn default_provider() -> String {
    "claude".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_max_tokens() -> u32 {
    1500
}
fn default_word_max_tokens() -> u32 {
    500
}
fn default_cache_ttl_secs() -> u64 {
    crate::cache::DEFAULT_TTL_SECS
}
fn default_batch_concurrency() -> usize {
    5
}
fn default_max_batch_items() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// "claude" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// "ENV" means: read from ANTHROPIC_API_KEY. Empty after resolution = not configured.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_word_max_tokens")]
    pub word_max_tokens: u32,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Model calls in flight at once for one batch request.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
    /// Larger batch requests are rejected.
    #[serde(default = "default_max_batch_items")]
    pub max_batch_items: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            provider: default_provider(),
            api_key: default_api_key(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            word_max_tokens: default_word_max_tokens(),
            cache_ttl_secs: default_cache_ttl_secs(),
            batch_concurrency: default_batch_concurrency(),
            max_batch_items: default_max_batch_items(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let cfg: AiConfig = serde_json::from_str(&data)?;
        cfg.finalize()
    }

    /// $AI_CONFIG_PATH, then config/ai.json, then defaults (key from env).
    pub fn load_default() -> anyhow::Result<Self> {
        if let Ok(p) = env::var(ENV_AI_CONFIG_PATH) {
            return Self::load_from_file(p);
        }
        if Path::new(DEFAULT_AI_CONFIG_PATH).exists() {
            return Self::load_from_file(DEFAULT_AI_CONFIG_PATH);
        }
        AiConfig::default().finalize()
    }

    fn finalize(mut self) -> anyhow::Result<Self> {
        self.provider = self.provider.trim().to_lowercase();
        if env::var(ENV_AI_TEST_MODE).map(|v| v == "mock").unwrap_or(false) {
            self.provider = "mock".to_string();
        }
        match self.provider.as_str() {
            "claude" | "mock" => {}
            other => anyhow::bail!("Unsupported provider in config: {other}"),
        }

        // A missing key is reported per call, not at boot.
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = env::var(ENV_ANTHROPIC_API_KEY).unwrap_or_default();
        }
        self.api_key = self.api_key.trim().to_string();

        if self.max_tokens == 0 {
            self.max_tokens = default_max_tokens();
        }
        if self.word_max_tokens == 0 {
            self.word_max_tokens = default_word_max_tokens();
        }
        if self.batch_concurrency == 0 {
            self.batch_concurrency = default_batch_concurrency();
        }
        if self.max_batch_items == 0 {
            self.max_batch_items = default_max_batch_items();
        }
        Ok(self)
    }

    pub fn has_credential(&self) -> bool {
        !self.api_key.is_empty()
    }
}
