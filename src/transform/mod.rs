// src/transform/mod.rs
//! Transform gateway: text simplification + Korean translation through an
//! external LLM, memoized in the optional KV cache. Failures degrade to an
//! identity sentence instead of failing the feed.

pub mod prompt;
pub mod provider;

use futures::{stream, StreamExt};
use metrics::{counter, describe_counter};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::{SharedKv, DEFAULT_TTL_SECS};
use crate::config::AiConfig;
use crate::error::GatewayError;
use crate::transform::provider::{build_provider, DynProvider};

pub(crate) const TEXT_MARKER: &str = "Text to convert:\n";
pub(crate) const WORD_PREFIX: &str = "Word/phrase: ";

pub const PLACEHOLDER_PARSE_FAILED: &str = "[변환 실패 - 원문 표시]";
pub const PLACEHOLDER_ERROR: &str = "[에러 발생]";
pub const MIN_TEXT_CHARS: usize = 3;
pub const DEFAULT_BATCH_CONCURRENCY: usize = 5;
pub const DEFAULT_MAX_BATCH_ITEMS: usize = 10;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("transform_cache_hits_total", "Transform/word results served from KV.");
        describe_counter!("transform_cache_misses_total", "Transform/word requests sent to the model.");
        describe_counter!("transform_fallbacks_total", "Requests answered with the identity fallback.");
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRequest {
    pub text: String,
    #[serde(default, alias = "subredditContext")]
    pub subreddit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlangNote {
    pub term: String,
    pub meaning: String,
    pub korean: String,
    pub example: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sentence {
    pub original: String,
    pub simplified: String,
    pub korean: String,
    pub slang_notes: Vec<SlangNote>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformResponse {
    #[serde(default)]
    pub sentences: Vec<Sentence>,
}

impl TransformResponse {
    /// Identity sentence shown when the collaborator could not help.
    pub fn fallback(text: &str, placeholder: &str) -> Self {
        Self {
            sentences: vec![Sentence {
                original: text.to_string(),
                simplified: text.to_string(),
                korean: placeholder.to_string(),
                slang_notes: Vec::new(),
            }],
        }
    }

    pub fn fallback_for(text: &str, err: &GatewayError) -> Self {
        let placeholder = match err {
            GatewayError::Parse(_) => PLACEHOLDER_PARSE_FAILED,
            _ => PLACEHOLDER_ERROR,
        };
        Self::fallback(text, placeholder)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRequest {
    pub word: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WordEntry {
    pub word: String,
    pub meaning: String,
    pub korean: String,
    pub pronunciation: String,
    pub examples: Vec<String>,
    pub tips: String,
}

impl WordEntry {
    pub fn unparsed(word: &str) -> Self {
        Self {
            word: word.to_string(),
            meaning: "Unable to parse response".to_string(),
            korean: "검색 실패".to_string(),
            ..Self::default()
        }
    }

    pub fn errored(word: &str) -> Self {
        Self {
            word: word.to_string(),
            meaning: "Error looking up word".to_string(),
            korean: "오류 발생".to_string(),
            ..Self::default()
        }
    }
}

/// Value plus whether it came from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub cache_hit: bool,
}

/// Result of `transform_or_fallback`: always has sentences to show.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformOutcome {
    #[serde(flatten)]
    pub response: TransformResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub cache_hit: bool,
}

/// Remove markdown code fences the model sometimes wraps JSON in.
pub fn strip_code_fences(s: &str) -> String {
    static RE_FENCE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"```(?:json)?\n?").expect("fence regex"));
    RE_FENCE.replace_all(s, "").trim().to_string()
}

fn parse_model_json<T: DeserializeOwned>(raw: &str) -> Result<T, GatewayError> {
    Ok(serde_json::from_str(&strip_code_fences(raw))?)
}

/// Short, stable, non-reversible id for logs and cache keys.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn transform_cache_key(req: &TransformRequest) -> String {
    let ctx = req.subreddit.as_deref().unwrap_or_default();
    format!("transform_{}", anon_hash(&format!("{ctx}\n{}", req.text)))
}

fn word_cache_key(word: &str) -> String {
    let norm: String = word
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    format!("word_{norm}")
}

pub struct TransformGateway {
    provider: DynProvider,
    enabled: bool,
    kv: Option<SharedKv>,
    max_tokens: u32,
    word_max_tokens: u32,
    ttl_secs: u64,
    batch_concurrency: usize,
    max_batch_items: usize,
}

impl TransformGateway {
    pub fn new(provider: DynProvider, kv: Option<SharedKv>) -> Self {
        Self {
            provider,
            enabled: true,
            kv,
            max_tokens: 1500,
            word_max_tokens: 500,
            ttl_secs: DEFAULT_TTL_SECS,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            max_batch_items: DEFAULT_MAX_BATCH_ITEMS,
        }
    }

    pub fn from_config(cfg: &AiConfig, kv: Option<SharedKv>) -> Self {
        let mut g = Self::new(build_provider(cfg), kv);
        g.enabled = cfg.enabled;
        g.max_tokens = cfg.max_tokens;
        g.word_max_tokens = cfg.word_max_tokens;
        g.ttl_secs = cfg.cache_ttl_secs;
        g.batch_concurrency = cfg.batch_concurrency.max(1);
        g.max_batch_items = cfg.max_batch_items.max(1);
        g
    }

    pub fn with_batch_concurrency(mut self, n: usize) -> Self {
        self.batch_concurrency = n.max(1);
        self
    }

    pub fn with_max_batch_items(mut self, n: usize) -> Self {
        self.max_batch_items = n.max(1);
        self
    }

    /// Upper bound the HTTP layer enforces on one batch request.
    pub fn max_batch_items(&self) -> usize {
        self.max_batch_items
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    async fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.kv.as_ref()?.get(key).await?;
        serde_json::from_str(&raw).ok()
    }

    async fn cache_put<T: Serialize>(&self, key: &str, value: &T) {
        let Some(kv) = self.kv.as_ref() else {
            return;
        };
        if let Ok(raw) = serde_json::to_string(value) {
            if !kv.set(key, &raw, self.ttl_secs).await {
                warn!(target: "cache", key, backend = kv.backend(), "kv set rejected");
            }
        }
    }

    /// Simplify + translate. Errors are returned as-is; see `transform_or_fallback`.
    pub async fn transform(&self, req: &TransformRequest) -> Result<Cached<TransformResponse>, GatewayError> {
        ensure_metrics_described();
        if req.text.trim().chars().count() < MIN_TEXT_CHARS {
            return Err(GatewayError::TextTooShort);
        }

        let key = transform_cache_key(req);
        if let Some(hit) = self.cache_get::<TransformResponse>(&key).await {
            counter!("transform_cache_hits_total").increment(1);
            return Ok(Cached {
                value: hit,
                cache_hit: true,
            });
        }
        counter!("transform_cache_misses_total").increment(1);
        if !self.enabled {
            return Err(GatewayError::Disabled);
        }

        let user = match req.subreddit.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(sub) => format!("Subreddit context: r/{sub}\n\n{TEXT_MARKER}{}", req.text),
            None => format!("{TEXT_MARKER}{}", req.text),
        };
        let raw = self
            .provider
            .complete(prompt::SIMPLIFY_SYSTEM_PROMPT, &user, self.max_tokens)
            .await?;
        let parsed: TransformResponse = parse_model_json(&raw)?;
        if parsed.sentences.is_empty() {
            return Err(GatewayError::Parse("no sentences".to_string()));
        }

        info!(
            target: "transform",
            id = %anon_hash(&req.text),
            provider = self.provider.name(),
            sentences = parsed.sentences.len(),
            "transformed"
        );
        self.cache_put(&key, &parsed).await;
        Ok(Cached {
            value: parsed,
            cache_hit: false,
        })
    }

    /// Never fails: any collaborator error becomes the identity fallback.
    pub async fn transform_or_fallback(&self, req: &TransformRequest) -> TransformOutcome {
        match self.transform(req).await {
            Ok(c) => TransformOutcome {
                response: c.value,
                error: None,
                cache_hit: c.cache_hit,
            },
            Err(e) => {
                warn!(target: "transform", id = %anon_hash(&req.text), error = %e, "transform degraded to fallback");
                counter!("transform_fallbacks_total").increment(1);
                TransformOutcome {
                    response: TransformResponse::fallback_for(&req.text, &e),
                    error: Some(e.to_string()),
                    cache_hit: false,
                }
            }
        }
    }

    /// Bounded concurrent fan-out (`batch_concurrency` calls in flight);
    /// output order matches input order.
    pub async fn transform_batch(&self, reqs: &[TransformRequest]) -> Vec<TransformOutcome> {
        let futs: Vec<_> = reqs.iter().map(|r| self.transform_or_fallback(r)).collect();
        stream::iter(futs)
            .buffered(self.batch_concurrency)
            .collect()
            .await
    }

    pub async fn lookup_word(&self, req: &WordRequest) -> Result<Cached<WordEntry>, GatewayError> {
        ensure_metrics_described();
        let word = req.word.trim();
        if word.is_empty() {
            return Err(GatewayError::TextTooShort);
        }

        // Context changes the explanation; only context-free lookups are shared.
        let key = req
            .context
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .is_none()
            .then(|| word_cache_key(word));
        if let Some(key) = key.as_deref() {
            if let Some(hit) = self.cache_get::<WordEntry>(key).await {
                counter!("transform_cache_hits_total").increment(1);
                return Ok(Cached {
                    value: hit,
                    cache_hit: true,
                });
            }
        }
        counter!("transform_cache_misses_total").increment(1);
        if !self.enabled {
            return Err(GatewayError::Disabled);
        }

        let user = match req.context.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(ctx) => format!("{WORD_PREFIX}\"{word}\"\nContext: \"{ctx}\"\n\nExplain this word/phrase."),
            None => format!("{WORD_PREFIX}\"{word}\"\n\nExplain this word/phrase."),
        };
        let raw = self
            .provider
            .complete(prompt::WORD_SYSTEM_PROMPT, &user, self.word_max_tokens)
            .await?;
        let entry: WordEntry = parse_model_json(&raw)?;

        if let Some(key) = key.as_deref() {
            self.cache_put(key, &entry).await;
        }
        Ok(Cached {
            value: entry,
            cache_hit: false,
        })
    }
}
