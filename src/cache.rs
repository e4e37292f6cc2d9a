// src/cache.rs
//! Optional key-value cache collaborator. Absence or failure only costs latency.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

pub const ENV_KV_URL: &str = "KV_REST_API_URL";
pub const ENV_KV_TOKEN: &str = "KV_REST_API_TOKEN";
pub const DEFAULT_TTL_SECS: u64 = 86_400;

#[async_trait]
pub trait KvCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    /// Returns whether the value was stored.
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> bool;
    fn backend(&self) -> &'static str;
}

pub type SharedKv = Arc<dyn KvCache>;

/// Vercel-KV style REST cache: `GET {url}/get/{key}`, `POST {url}/set/{key}`.
pub struct RestKv {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl RestKv {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            http,
            url: url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Build from `KV_REST_API_URL` / `KV_REST_API_TOKEN`; `None` if either is missing.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var(ENV_KV_URL).ok().filter(|s| !s.trim().is_empty())?;
        let token = std::env::var(ENV_KV_TOKEN).ok().filter(|s| !s.trim().is_empty())?;
        Some(Self::new(url, token))
    }
}

#[derive(Deserialize)]
struct GetResp {
    result: Option<String>,
}

#[async_trait]
impl KvCache for RestKv {
    async fn get(&self, key: &str) -> Option<String> {
        let resp = self
            .http
            .get(format!("{}/get/{}", self.url, key))
            .bearer_auth(&self.token)
            .send()
            .await;
        match resp {
            Ok(r) if r.status().is_success() => r.json::<GetResp>().await.ok()?.result,
            Ok(r) => {
                warn!(target: "cache", status = r.status().as_u16(), "kv get failed");
                None
            }
            Err(e) => {
                warn!(target: "cache", error = %e, "kv get error");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> bool {
        let resp = self
            .http
            .post(format!("{}/set/{}", self.url, key))
            .bearer_auth(&self.token)
            .json(&json!({ "value": value, "ex": ttl_secs }))
            .send()
            .await;
        match resp {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                warn!(target: "cache", error = %e, "kv set error");
                false
            }
        }
    }

    fn backend(&self) -> &'static str {
        "rest"
    }
}

/// Expired entries are swept on write once the map reaches this size.
pub const MEMORY_SWEEP_AT: usize = 256;
pub const MEMORY_MAX_ENTRIES: usize = 10_000;

/// Process-local TTL map. Used when no REST KV is configured, and in tests.
/// Bounded: expired entries are swept on write, and at capacity the entry
/// closest to expiry is evicted.
pub struct MemoryKv {
    /// `None` expiry = TTL too large to represent; never expires.
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
    sweep_at: usize,
    max_entries: usize,
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            sweep_at: MEMORY_SWEEP_AT,
            max_entries: MEMORY_MAX_ENTRIES,
        }
    }
}

fn is_live(exp: Option<Instant>, now: Instant) -> bool {
    exp.map_or(true, |e| e > now)
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(sweep_at: usize, max_entries: usize) -> Self {
        Self {
            sweep_at,
            max_entries: max_entries.max(1),
            ..Self::default()
        }
    }

    /// Entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvCache for MemoryKv {
    async fn get(&self, key: &str) -> Option<String> {
        let mut g = self.entries.lock().ok()?;
        match g.get(key) {
            Some((v, exp)) if is_live(*exp, Instant::now()) => Some(v.clone()),
            Some(_) => {
                g.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> bool {
        let Ok(mut g) = self.entries.lock() else {
            return false;
        };
        let now = Instant::now();
        if g.len() >= self.sweep_at {
            g.retain(|_, (_, exp)| is_live(*exp, now));
        }
        if g.len() >= self.max_entries && !g.contains_key(key) {
            // Soonest expiry goes first; never-expiring entries go last.
            let victim = g
                .iter()
                .min_by_key(|(_, (_, exp))| (exp.is_none(), *exp))
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                g.remove(&victim);
            }
        }
        let exp = now.checked_add(Duration::from_secs(ttl_secs));
        g.insert(key.to_string(), (value.to_string(), exp));
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
