// src/transform/provider.rs
//! Low-level LLM providers. They only return the model's raw text; the
//! gateway owns parsing, caching and fallbacks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::error::GatewayError;

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Result<String, GatewayError>> + Send + 'a>>;

pub trait TextProvider: Send + Sync + 'static {
    fn complete<'a>(&'a self, system: &'a str, user: &'a str, max_tokens: u32) -> ProviderFuture<'a>;
    fn name(&self) -> &'static str;
}

pub type DynProvider = Arc<dyn TextProvider>;

/// Factory: mock when configured (or `AI_TEST_MODE=mock`), Claude otherwise.
pub fn build_provider(cfg: &AiConfig) -> DynProvider {
    match cfg.provider.as_str() {
        "mock" => Arc::new(MockProvider::echo()),
        _ => Arc::new(ClaudeProvider::new(cfg.api_key.clone(), Some(&cfg.model))),
    }
}

/// Anthropic Messages API.
pub struct ClaudeProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl ClaudeProvider {
    pub fn new(api_key: String, model_override: Option<&str>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("reddit-english-feed/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        let model = model_override.unwrap_or("claude-sonnet-4-20250514").to_string();
        Self {
            http,
            api_key,
            model,
            base_url: ANTHROPIC_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct MessagesReq<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Msg<'a>>,
}

#[derive(Deserialize)]
struct MessagesResp {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl TextProvider for ClaudeProvider {
    fn complete<'a>(&'a self, system: &'a str, user: &'a str, max_tokens: u32) -> ProviderFuture<'a> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(GatewayError::MissingCredential);
            }

            let req = MessagesReq {
                model: &self.model,
                max_tokens,
                system,
                messages: vec![Msg {
                    role: "user",
                    content: user,
                }],
            };

            let resp = self
                .http
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&req)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let message = resp.text().await.unwrap_or_default();
                return Err(GatewayError::Upstream {
                    status: status.as_u16(),
                    message,
                });
            }

            let body: MessagesResp = resp.json().await?;
            body.content
                .into_iter()
                .find_map(|b| b.text)
                .ok_or_else(|| GatewayError::Parse("response has no text block".to_string()))
        })
    }

    fn name(&self) -> &'static str {
        "claude"
    }
}

type Responder = dyn Fn(&str) -> Result<String, GatewayError> + Send + Sync;

/// Deterministic provider for tests/local runs.
#[derive(Clone)]
pub struct MockProvider {
    respond: Arc<Responder>,
}

impl MockProvider {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<String, GatewayError> + Send + Sync + 'static,
    {
        Self {
            respond: Arc::new(f),
        }
    }

    /// Echoes the input back as a well-formed (fenced) model answer.
    pub fn echo() -> Self {
        Self::new(echo_reply)
    }
}

/// Canned answer used by `MockProvider::echo`.
pub fn echo_reply(user: &str) -> Result<String, GatewayError> {
    let body = if let Some(word) = user.strip_prefix(super::WORD_PREFIX) {
        let word = word.lines().next().unwrap_or_default().trim_matches('"');
        serde_json::json!({
            "word": word,
            "meaning": format!("{word} (mock)"),
            "korean": "(mock)",
            "pronunciation": "",
            "examples": [],
            "tips": ""
        })
    } else {
        let text = user
            .split_once(super::TEXT_MARKER)
            .map(|(_, t)| t)
            .unwrap_or(user);
        serde_json::json!({
            "sentences": [{
                "original": text,
                "simplified": text,
                "korean": "(mock)",
                "slang_notes": []
            }]
        })
    };
    Ok(format!("```json\n{body}\n```"))
}

impl TextProvider for MockProvider {
    fn complete<'a>(&'a self, _system: &'a str, user: &'a str, _max_tokens: u32) -> ProviderFuture<'a> {
        let out = (self.respond)(user);
        Box::pin(async move { out })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
