// src/api.rs
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::cache::{MemoryKv, RestKv, SharedKv};
use crate::config::{AiConfig, FeedConfig};
use crate::error::{AllSourcesFailed, GatewayError};
use crate::feed::transport::{HttpTransport, Transport};
use crate::feed::types::is_reddit_ident;
use crate::feed::FeedClient;
use crate::transform::{
    TransformGateway, TransformRequest, TransformResponse, WordEntry, WordRequest,
};

const MAX_POSTS_LIMIT: usize = 100;
const MAX_COMMENTS_LIMIT: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub feed: Arc<FeedClient>,
    pub gateway: Arc<TransformGateway>,
    /// Shared REST KV exposed on `/api/cache`; `None` = not configured.
    pub kv: Option<SharedKv>,
    pub feed_cfg: Arc<FeedConfig>,
}

impl AppState {
    pub fn new(
        feed_cfg: FeedConfig,
        transport: Arc<dyn Transport>,
        gateway: TransformGateway,
        kv: Option<SharedKv>,
    ) -> Self {
        let feed = FeedClient::new(feed_cfg.posts_registry(), feed_cfg.comments_registry(), transport);
        Self {
            feed: Arc::new(feed),
            gateway: Arc::new(gateway),
            kv,
            feed_cfg: Arc::new(feed_cfg),
        }
    }

    /// Wire everything from config files + environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let feed_cfg = FeedConfig::load_default()?;
        let ai_cfg = AiConfig::load_default()?;
        let kv: Option<SharedKv> = RestKv::from_env().map(|k| Arc::new(k) as SharedKv);

        // Without a shared KV the gateway still memoizes in-process.
        let gateway_kv = kv
            .clone()
            .unwrap_or_else(|| Arc::new(MemoryKv::new()) as SharedKv);
        let gateway = TransformGateway::from_config(&ai_cfg, Some(gateway_kv));

        tracing::info!(
            provider = gateway.provider_name(),
            ai_enabled = ai_cfg.enabled,
            key_len = ai_cfg.api_key.len(),
            kv = kv.is_some(),
            "app state initialized"
        );
        Ok(Self::new(
            feed_cfg,
            Arc::new(HttpTransport::default()),
            gateway,
            kv,
        ))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/reddit", get(get_posts))
        .route("/api/comments", get(get_comments))
        .route("/api/transform", post(transform))
        .route("/api/transform/batch", post(transform_batch))
        .route("/api/word", post(word))
        .route("/api/cache", get(cache_api).post(cache_api))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Lenient numeric query param: junk or zero means "use the default".
fn parse_limit(raw: Option<&str>, default: usize, max: usize) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
        .min(max)
}

fn is_kv_key(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 200
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'))
}

fn error_json(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(json!({ "error": msg.into() }))).into_response()
}

#[derive(Deserialize)]
struct PostsQuery {
    limit: Option<String>,
    after: Option<String>,
}

async fn get_posts(State(state): State<AppState>, Query(q): Query<PostsQuery>) -> Response {
    let limit = parse_limit(
        q.limit.as_deref(),
        state.feed_cfg.default_posts_limit,
        MAX_POSTS_LIMIT,
    );
    let after = q.after.filter(|a| !a.trim().is_empty());

    match state.feed.get_posts(limit, after).await {
        Ok(page) => (
            StatusCode::OK,
            [(
                header::CACHE_CONTROL,
                HeaderValue::from_static("s-maxage=30, stale-while-revalidate=60"),
            )],
            Json(json!({
                "count": page.posts.len(),
                "posts": page.posts,
                "after": page.after,
                "isLive": true,
                "source": page.source,
            })),
        )
            .into_response(),
        Err(e) => all_failed(e, "posts"),
    }
}

fn all_failed(e: AllSourcesFailed, items_field: &str) -> Response {
    let mut body = json!({
        "error": e.to_string(),
        "isLive": false,
        "attempts": e.attempts,
    });
    body[items_field] = json!([]);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

#[derive(Deserialize)]
struct CommentsQuery {
    #[serde(rename = "postId")]
    post_id: Option<String>,
    subreddit: Option<String>,
    limit: Option<String>,
}

async fn get_comments(State(state): State<AppState>, Query(q): Query<CommentsQuery>) -> Response {
    let (Some(post_id), Some(subreddit)) = (q.post_id, q.subreddit) else {
        return error_json(StatusCode::BAD_REQUEST, "postId and subreddit required");
    };
    if !is_reddit_ident(&post_id) || !is_reddit_ident(&subreddit) {
        return error_json(StatusCode::BAD_REQUEST, "invalid postId or subreddit");
    }
    let limit = parse_limit(
        q.limit.as_deref(),
        state.feed_cfg.default_comments_limit,
        MAX_COMMENTS_LIMIT,
    );

    match state.feed.get_comments(&post_id, &subreddit, limit).await {
        Ok(page) => {
            let total = page.comments.len();
            let comments: Vec<_> = page
                .comments
                .into_iter()
                .take(state.feed_cfg.comments_response_cap)
                .collect();
            Json(json!({
                "comments": comments,
                "total": total,
                "isLive": true,
                "source": page.source,
            }))
            .into_response()
        }
        Err(e) => all_failed(e, "comments"),
    }
}

fn cache_header(hit: bool) -> [(&'static str, HeaderValue); 1] {
    [(
        "X-Transform-Cache",
        HeaderValue::from_static(if hit { "HIT" } else { "MISS" }),
    )]
}

#[derive(Deserialize)]
struct TransformBody {
    #[serde(default)]
    text: String,
    #[serde(default, alias = "subredditContext")]
    subreddit: Option<String>,
}

async fn transform(State(state): State<AppState>, Json(body): Json<TransformBody>) -> Response {
    let req = TransformRequest {
        text: body.text,
        subreddit: body.subreddit,
    };
    match state.gateway.transform(&req).await {
        Ok(c) => (cache_header(c.cache_hit), Json(c.value)).into_response(),
        Err(e @ GatewayError::TextTooShort) => error_json(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e @ GatewayError::MissingCredential) => {
            error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e @ GatewayError::Parse(_)) => {
            tracing::warn!(target: "transform", error = %e, "model output not JSON");
            Json(TransformResponse::fallback_for(&req.text, &e)).into_response()
        }
        Err(e) => {
            tracing::warn!(target: "transform", error = %e, "transform failed");
            let fallback = TransformResponse::fallback_for(&req.text, &e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string(), "sentences": fallback.sentences })),
            )
                .into_response()
        }
    }
}

async fn transform_batch(
    State(state): State<AppState>,
    Json(items): Json<Vec<TransformRequest>>,
) -> Response {
    let max = state.gateway.max_batch_items();
    if items.len() > max {
        return error_json(
            StatusCode::BAD_REQUEST,
            format!("Too many items: {} (max {max})", items.len()),
        );
    }
    Json(state.gateway.transform_batch(&items).await).into_response()
}

#[derive(Deserialize)]
struct WordBody {
    #[serde(default)]
    word: String,
    #[serde(default)]
    context: Option<String>,
}

async fn word(State(state): State<AppState>, Json(body): Json<WordBody>) -> Response {
    let req = WordRequest {
        word: body.word,
        context: body.context,
    };
    match state.gateway.lookup_word(&req).await {
        Ok(c) => (cache_header(c.cache_hit), Json(c.value)).into_response(),
        Err(GatewayError::TextTooShort) => error_json(StatusCode::BAD_REQUEST, "Word is required"),
        Err(e @ GatewayError::MissingCredential) => {
            error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(GatewayError::Parse(_)) => Json(WordEntry::unparsed(req.word.trim())).into_response(),
        Err(e) => {
            tracing::warn!(target: "transform", error = %e, "word lookup failed");
            let mut body = serde_json::to_value(WordEntry::errored(req.word.trim()))
                .unwrap_or_else(|_| json!({}));
            body["error"] = json!(e.to_string());
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

#[derive(Deserialize)]
struct CacheQuery {
    action: Option<String>,
    key: Option<String>,
}

#[derive(Deserialize)]
struct CacheSetBody {
    value: serde_json::Value,
}

async fn cache_api(
    State(state): State<AppState>,
    method: Method,
    Query(q): Query<CacheQuery>,
    body: Bytes,
) -> Response {
    let action = q.action.as_deref().unwrap_or_default();

    if action == "status" {
        let enabled = state.kv.is_some();
        return Json(json!({
            "kvEnabled": enabled,
            "message": if enabled {
                "KV is configured"
            } else {
                "Using session storage (KV not configured)"
            },
        }))
        .into_response();
    }

    let Some(kv) = state.kv.as_ref() else {
        return Json(json!({ "error": "KV not configured", "useLocal": true })).into_response();
    };

    match (action, q.key.as_deref().filter(|k| is_kv_key(k))) {
        ("get", Some(key)) => {
            let value = kv.get(key).await;
            Json(json!({ "key": key, "found": value.is_some(), "value": value })).into_response()
        }
        ("set", Some(key)) if method == Method::POST => {
            let parsed: CacheSetBody = match serde_json::from_slice(&body) {
                Ok(b) => b,
                Err(e) => return error_json(StatusCode::BAD_REQUEST, e.to_string()),
            };
            let success = kv
                .set(key, &parsed.value.to_string(), crate::cache::DEFAULT_TTL_SECS)
                .await;
            Json(json!({ "success": success, "key": key })).into_response()
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Invalid action",
                "usage": "?action=get&key=xxx or ?action=set&key=xxx (POST with body)",
            })),
        )
            .into_response(),
    }
}
