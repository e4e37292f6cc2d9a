// src/feed/types.rs
use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FetchError;
use crate::feed::normalize::{self, NormalizePolicy};
use crate::feed::shapes;

/// Subreddit names and post ids: `[A-Za-z0-9_]+`. Anything else could
/// rewrite the upstream path or query.
pub fn is_reddit_ident(s: &str) -> bool {
    !s.is_empty() && s.len() <= 64 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// What the caller wants, independent of where it comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedRequest {
    Posts {
        limit: usize,
        after: Option<String>,
    },
    Comments {
        post_id: String,
        subreddit: String,
        limit: usize,
    },
}

impl FeedRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            FeedRequest::Posts { .. } => "posts",
            FeedRequest::Comments { .. } => "comments",
        }
    }
}

/// One upstream response shape. Each variant owns its URL layout and its decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceKind {
    /// Reddit-compatible listing host (`www.`, `old.`, `api.reddit.com`).
    RedditListing {
        base: String,
        #[serde(default = "default_feed")]
        feed: String,
        /// `api.reddit.com` serves JSON without the `.json` suffix.
        #[serde(default = "default_true")]
        json_suffix: bool,
        /// Upstream page size; oversized so filtering still leaves enough posts.
        #[serde(default = "default_page_size")]
        page_size: usize,
    },
    /// Reddit comment thread: `[post_listing, comment_listing]`.
    RedditThread { base: String },
    /// PullPush archive mirror; flat comment search, no nesting.
    PullPushComments { base: String },
}

fn default_feed() -> String {
    "popular".to_string()
}
fn default_true() -> bool {
    true
}
fn default_page_size() -> usize {
    50
}

/// Route the target URL through a public CORS proxy: `prefix + encode(target)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRoute {
    pub prefix: String,
}

impl ProxyRoute {
    pub fn wrap(&self, target: &str) -> String {
        format!("{}{}", self.prefix, encode_component(target))
    }
}

fn encode_component(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// A named upstream: how to build its URL, which headers it needs, and how to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub upstream: SourceKind,
    #[serde(default)]
    pub proxy: Option<ProxyRoute>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl SourceDescriptor {
    pub fn new(name: impl Into<String>, upstream: SourceKind) -> Self {
        Self {
            name: name.into(),
            upstream,
            proxy: None,
            headers: BTreeMap::new(),
            timeout_ms: None,
        }
    }

    pub fn via_proxy(mut self, prefix: impl Into<String>) -> Self {
        self.proxy = Some(ProxyRoute {
            prefix: prefix.into(),
        });
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    pub fn timeout(&self, fallback: Duration) -> Duration {
        self.timeout_ms.map(Duration::from_millis).unwrap_or(fallback)
    }

    /// Request URL for `req`, or `Unsupported` when this shape cannot answer it.
    pub fn build_url(&self, req: &FeedRequest) -> Result<String, FetchError> {
        if let FeedRequest::Comments {
            post_id, subreddit, ..
        } = req
        {
            if !is_reddit_ident(post_id) || !is_reddit_ident(subreddit) {
                return Err(FetchError::InvalidRequest(
                    "postId and subreddit must match [A-Za-z0-9_]+".to_string(),
                ));
            }
        }
        let target = match (&self.upstream, req) {
            (
                SourceKind::RedditListing {
                    base,
                    feed,
                    json_suffix,
                    page_size,
                },
                FeedRequest::Posts { limit, after },
            ) => {
                let suffix = if *json_suffix { ".json" } else { "" };
                let size = (*page_size).max(*limit);
                let mut url = format!(
                    "{}/r/{}/hot{}?limit={}&raw_json=1",
                    base.trim_end_matches('/'),
                    feed,
                    suffix,
                    size
                );
                if let Some(after) = after.as_deref().filter(|a| !a.is_empty()) {
                    url.push_str("&after=");
                    url.push_str(&encode_component(after));
                }
                url
            }
            (
                SourceKind::RedditThread { base },
                FeedRequest::Comments {
                    post_id,
                    subreddit,
                    limit,
                },
            ) => format!(
                "{}/r/{}/comments/{}.json?limit={}&sort=top&raw_json=1",
                base.trim_end_matches('/'),
                subreddit,
                post_id,
                limit
            ),
            (
                SourceKind::PullPushComments { base },
                FeedRequest::Comments { post_id, limit, .. },
            ) => format!(
                "{}/reddit/search/comment/?link_id=t3_{}&size={}&sort=desc&sort_type=score",
                base.trim_end_matches('/'),
                post_id,
                limit
            ),
            (_, other) => return Err(FetchError::Unsupported(other.kind())),
        };

        Ok(match &self.proxy {
            Some(p) => p.wrap(&target),
            None => target,
        })
    }

    /// Map a decoded body into the canonical page. `None` = nothing usable here.
    pub fn transform(
        &self,
        req: &FeedRequest,
        body: &Value,
        policy: &NormalizePolicy,
    ) -> Option<NormalizedPage> {
        match (&self.upstream, req) {
            (SourceKind::RedditListing { .. }, FeedRequest::Posts { limit, .. }) => {
                let listing = shapes::decode_listing(body)?;
                let posts = normalize::normalize_posts(&listing.children, policy, *limit);
                Some(NormalizedPage {
                    items: FeedItems::Posts(posts),
                    cursor: listing.after,
                })
            }
            (SourceKind::RedditThread { .. }, FeedRequest::Comments { .. }) => {
                let listing = shapes::decode_thread(body)?;
                Some(NormalizedPage {
                    items: FeedItems::Comments(normalize::flatten_comments(
                        &listing.children,
                        policy,
                    )),
                    cursor: None,
                })
            }
            (SourceKind::PullPushComments { .. }, FeedRequest::Comments { .. }) => {
                let raw = shapes::decode_pullpush(body)?;
                Some(NormalizedPage {
                    items: FeedItems::Comments(normalize::normalize_archive_comments(&raw)),
                    cursor: None,
                })
            }
            _ => None,
        }
    }
}

/// Canonical post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub subreddit: String,
    pub score: i64,
    pub num_comments: i64,
    pub created_utc: i64,
    pub author: String,
    pub permalink: String,
    pub url: String,
    pub thumbnail: String,
    pub preview: Option<Value>,
    pub selftext: String,
    pub is_video: bool,
    pub media: Option<Value>,
    pub post_hint: Option<String>,
}

/// Canonical comment, flattened. `depth` 0 is top-level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub body: String,
    pub author: String,
    pub score: i64,
    pub created_utc: i64,
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedItems {
    Posts(Vec<Post>),
    Comments(Vec<Comment>),
}

impl FeedItems {
    pub fn len(&self) -> usize {
        match self {
            FeedItems::Posts(v) => v.len(),
            FeedItems::Comments(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPage {
    pub items: FeedItems,
    pub cursor: Option<String>,
}
