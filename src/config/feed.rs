// src/config/feed.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::feed::normalize::NormalizePolicy;
use crate::feed::registry::{
    default_comments_sources, default_posts_sources, SourceRegistry, DEFAULT_TIMEOUT_MS,
};
use crate::feed::types::SourceDescriptor;

pub const ENV_FEED_CONFIG_PATH: &str = "FEED_CONFIG_PATH";
pub const DEFAULT_FEED_CONFIG_PATH: &str = "config/feed.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Per-attempt timeout for sources without their own `timeout_ms`.
    pub timeout_ms: u64,
    pub default_posts_limit: usize,
    pub default_comments_limit: usize,
    /// Max comments returned to the UI per request.
    pub comments_response_cap: usize,
    pub policy: NormalizePolicy,
    /// Empty = built-in chain.
    pub posts_sources: Vec<SourceDescriptor>,
    pub comments_sources: Vec<SourceDescriptor>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            default_posts_limit: 25,
            default_comments_limit: 15,
            comments_response_cap: 20,
            policy: NormalizePolicy::default(),
            posts_sources: Vec::new(),
            comments_sources: Vec::new(),
        }
    }
}

impl FeedConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: FeedConfig = toml::from_str(s).context("parsing feed config")?;
        if cfg.timeout_ms == 0 {
            cfg.timeout_ms = DEFAULT_TIMEOUT_MS;
        }
        if cfg.comments_response_cap == 0 {
            cfg.comments_response_cap = FeedConfig::default().comments_response_cap;
        }
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading feed config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Env var + fallbacks:
    /// 1) $FEED_CONFIG_PATH (must exist)
    /// 2) config/feed.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_FEED_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("FEED_CONFIG_PATH points to non-existent path"));
        }
        let p = PathBuf::from(DEFAULT_FEED_CONFIG_PATH);
        if p.exists() {
            return Self::load_from(&p);
        }
        Ok(Self::default())
    }

    fn registry(&self, sources: &[SourceDescriptor], fallback: fn() -> Vec<SourceDescriptor>) -> SourceRegistry {
        let list = if sources.is_empty() {
            fallback()
        } else {
            sources.to_vec()
        };
        SourceRegistry::new(list, self.policy.clone())
            .with_default_timeout(Duration::from_millis(self.timeout_ms))
    }

    pub fn posts_registry(&self) -> SourceRegistry {
        self.registry(&self.posts_sources, default_posts_sources)
    }

    pub fn comments_registry(&self) -> SourceRegistry {
        self.registry(&self.comments_sources, default_comments_sources)
    }
}
