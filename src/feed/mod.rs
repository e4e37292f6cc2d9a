// src/feed/mod.rs
//! Multi-source fetch with fallback: try each registered source in order,
//! return the first non-empty normalized page.

pub mod normalize;
pub mod registry;
pub mod shapes;
pub mod transport;
pub mod types;

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AllSourcesFailed, FetchError, SourceAttempt};
use crate::feed::registry::SourceRegistry;
use crate::feed::transport::Transport;
use crate::feed::types::{Comment, FeedItems, FeedRequest, NormalizedPage, Post};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "feed_source_attempts_total",
            "Source attempts by source name and outcome."
        );
        describe_counter!(
            "feed_resolve_failures_total",
            "Logical requests where every source failed."
        );
        describe_histogram!("feed_resolve_ms", "Wall time of one resolve pass in milliseconds.");
    });
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub page: NormalizedPage,
    pub source: String,
}

/// Single sequential pass over `registry`. Stops at the first source whose
/// transform yields a non-empty page; otherwise reports every attempt.
pub async fn resolve(
    req: &FeedRequest,
    registry: &SourceRegistry,
    transport: &dyn Transport,
) -> Result<Resolved, AllSourcesFailed> {
    ensure_metrics_described();
    let t0 = Instant::now();
    let kind = req.kind();
    let mut attempts = Vec::with_capacity(registry.len());

    for source in registry.sources() {
        info!(target: "feed", kind, source = %source.name, "trying source");

        let outcome = match source.build_url(req) {
            Ok(url) => {
                let timeout = source.timeout(registry.default_timeout());
                transport
                    .fetch_raw(&url, &source.headers, timeout)
                    .await
                    .and_then(|body| {
                        source
                            .transform(req, &body, registry.policy())
                            .filter(|page| !page.items.is_empty())
                            .ok_or(FetchError::EmptyResult)
                    })
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(page) => {
                info!(
                    target: "feed",
                    kind,
                    source = %source.name,
                    items = page.items.len(),
                    "source succeeded"
                );
                counter!("feed_source_attempts_total", "source" => source.name.clone(), "outcome" => "ok")
                    .increment(1);
                histogram!("feed_resolve_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                return Ok(Resolved {
                    page,
                    source: source.name.clone(),
                });
            }
            Err(error) => {
                warn!(target: "feed", kind, source = %source.name, %error, "source failed");
                counter!("feed_source_attempts_total", "source" => source.name.clone(), "outcome" => "error")
                    .increment(1);
                attempts.push(SourceAttempt {
                    source: source.name.clone(),
                    error,
                });
            }
        }
    }

    counter!("feed_resolve_failures_total").increment(1);
    histogram!("feed_resolve_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    warn!(target: "feed", kind, attempts = attempts.len(), "all sources failed");
    Err(AllSourcesFailed { attempts })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostsPage {
    pub posts: Vec<Post>,
    pub after: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentsPage {
    pub comments: Vec<Comment>,
    pub source: String,
}

/// Caller-facing entry: one registry per request kind, one shared transport.
#[derive(Clone)]
pub struct FeedClient {
    posts: SourceRegistry,
    comments: SourceRegistry,
    transport: Arc<dyn Transport>,
}

impl FeedClient {
    pub fn new(posts: SourceRegistry, comments: SourceRegistry, transport: Arc<dyn Transport>) -> Self {
        Self {
            posts,
            comments,
            transport,
        }
    }

    pub async fn get_posts(&self, limit: usize, after: Option<String>) -> Result<PostsPage, AllSourcesFailed> {
        let req = FeedRequest::Posts { limit, after };
        let resolved = resolve(&req, &self.posts, self.transport.as_ref()).await?;
        let posts = match resolved.page.items {
            FeedItems::Posts(p) => p,
            FeedItems::Comments(_) => Vec::new(),
        };
        if let Some(top) = posts.first() {
            info!(target: "feed", subreddit = %top.subreddit, count = posts.len(), "posts resolved");
        }
        Ok(PostsPage {
            posts,
            after: resolved.page.cursor,
            source: resolved.source,
        })
    }

    pub async fn get_comments(
        &self,
        post_id: &str,
        subreddit: &str,
        limit: usize,
    ) -> Result<CommentsPage, AllSourcesFailed> {
        let req = FeedRequest::Comments {
            post_id: post_id.to_string(),
            subreddit: subreddit.to_string(),
            limit,
        };
        let resolved = resolve(&req, &self.comments, self.transport.as_ref()).await?;
        let comments = match resolved.page.items {
            FeedItems::Comments(c) => c,
            FeedItems::Posts(_) => Vec::new(),
        };
        Ok(CommentsPage {
            comments,
            source: resolved.source,
        })
    }
}
