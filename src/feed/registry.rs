// src/feed/registry.rs
//! Declarative default source chains. Order is priority: first = preferred.

use std::sync::Arc;
use std::time::Duration;

use crate::feed::normalize::NormalizePolicy;
use crate::feed::types::{SourceDescriptor, SourceKind};

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const APP_USER_AGENT: &str = "RedditEnglishApp/1.0 (Educational English Learning App)";

const REDDIT_WWW: &str = "https://www.reddit.com";
const REDDIT_OLD: &str = "https://old.reddit.com";
const REDDIT_API: &str = "https://api.reddit.com";
const PULLPUSH: &str = "https://api.pullpush.io";
const CORSPROXY: &str = "https://corsproxy.io/?";
const ALLORIGINS_RAW: &str = "https://api.allorigins.win/raw?url=";
const ALLORIGINS_GET: &str = "https://api.allorigins.win/get?url=";

/// Immutable, ordered list of sources plus the normalization policy their
/// transforms apply. Shared read-only across requests.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Arc<[SourceDescriptor]>,
    policy: Arc<NormalizePolicy>,
    default_timeout: Duration,
}

impl SourceRegistry {
    pub fn new(sources: Vec<SourceDescriptor>, policy: NormalizePolicy) -> Self {
        Self {
            sources: sources.into(),
            policy: Arc::new(policy),
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn policy(&self) -> &NormalizePolicy {
        &self.policy
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

fn listing(base: &str, json_suffix: bool) -> SourceKind {
    SourceKind::RedditListing {
        base: base.to_string(),
        feed: "popular".to_string(),
        json_suffix,
        page_size: 50,
    }
}

fn thread(base: &str) -> SourceKind {
    SourceKind::RedditThread {
        base: base.to_string(),
    }
}

/// Hot posts: direct Reddit hosts first, then proxied.
pub fn default_posts_sources() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor::new("www.reddit.com", listing(REDDIT_WWW, true))
            .with_header("User-Agent", APP_USER_AGENT)
            .with_header("Accept", "application/json"),
        SourceDescriptor::new("old.reddit.com", listing(REDDIT_OLD, true))
            .with_header("User-Agent", APP_USER_AGENT)
            .with_header("Accept", "application/json"),
        SourceDescriptor::new("api.reddit.com", listing(REDDIT_API, false))
            .with_header("User-Agent", "RedditEnglishApp/1.0")
            .with_header("Accept", "application/json"),
        SourceDescriptor::new("Reddit via corsproxy", listing(REDDIT_WWW, true)).via_proxy(CORSPROXY),
        SourceDescriptor::new("Reddit via allorigins", listing(REDDIT_WWW, true))
            .via_proxy(ALLORIGINS_GET),
    ]
}

/// Comments: archive mirror first, then proxied thread JSON, then direct.
pub fn default_comments_sources() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor::new(
            "PullPush",
            SourceKind::PullPushComments {
                base: PULLPUSH.to_string(),
            },
        ),
        SourceDescriptor::new("Reddit via corsproxy", thread(REDDIT_WWW)).via_proxy(CORSPROXY),
        SourceDescriptor::new("Reddit via allorigins", thread(REDDIT_WWW)).via_proxy(ALLORIGINS_RAW),
        SourceDescriptor::new("Reddit direct", thread(REDDIT_WWW)),
    ]
}
