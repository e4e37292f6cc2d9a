// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot, with a
// canned transport behind the feed and a mock model behind the gateway.

mod common;

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use common::{fixture, StubTransport, HOT, THREAD};
use reddit_english_feed::cache::{MemoryKv, SharedKv};
use reddit_english_feed::config::FeedConfig;
use reddit_english_feed::feed::types::{SourceDescriptor, SourceKind};
use reddit_english_feed::transform::provider::MockProvider;
use reddit_english_feed::transform::TransformGateway;
use reddit_english_feed::{api, AppState, FetchError, GatewayError};
use serde_json::{json, Value};
use tower::ServiceExt as _; // for `oneshot`

const BODY_LIMIT: usize = 1024 * 1024;

fn feed_cfg() -> FeedConfig {
    FeedConfig {
        comments_response_cap: 2,
        posts_sources: vec![
            SourceDescriptor::new(
                "www.reddit.com",
                SourceKind::RedditListing {
                    base: "https://www.test".into(),
                    feed: "popular".into(),
                    json_suffix: true,
                    page_size: 50,
                },
            ),
            SourceDescriptor::new(
                "old.reddit.com",
                SourceKind::RedditListing {
                    base: "https://old.test".into(),
                    feed: "popular".into(),
                    json_suffix: true,
                    page_size: 50,
                },
            ),
        ],
        comments_sources: vec![SourceDescriptor::new(
            "Reddit direct",
            SourceKind::RedditThread {
                base: "https://thread.test".into(),
            },
        )],
        ..FeedConfig::default()
    }
}

fn healthy_transport() -> StubTransport {
    StubTransport::new()
        .route("www.test", Err(FetchError::HttpStatus { status: 403 }))
        .route("old.test", Ok(fixture(HOT)))
        .route("thread.test", Ok(fixture(THREAD)))
}

fn router_with(transport: StubTransport, provider: MockProvider, kv: Option<SharedKv>) -> Router {
    let gateway_kv: SharedKv = Arc::new(MemoryKv::new());
    let gateway = TransformGateway::new(Arc::new(provider), Some(gateway_kv));
    api::router(AppState::new(feed_cfg(), Arc::new(transport), gateway, kv))
}

fn test_router() -> Router {
    router_with(healthy_transport(), MockProvider::echo(), None)
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, v)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET")
}

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST")
}

#[tokio::test]
async fn health_returns_ok() {
    let resp = test_router().oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn posts_come_from_first_working_source() {
    let (status, headers, v) = send(test_router(), get("/api/reddit?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["source"], "old.reddit.com");
    assert_eq!(v["isLive"], true);
    assert_eq!(v["count"], 2);
    assert_eq!(v["posts"].as_array().unwrap().len(), 2);
    assert_eq!(v["after"], "t3_1abcdef");
    assert_eq!(v["posts"][0]["id"], "1a0001");
    assert!(headers
        .get("cache-control")
        .and_then(|h| h.to_str().ok())
        .unwrap()
        .contains("s-maxage=30"));
}

#[tokio::test]
async fn posts_all_failed_is_500_with_attempts() {
    let transport = StubTransport::new()
        .route("www.test", Err(FetchError::Timeout(10_000)))
        .route("old.test", Ok(json!({ "data": { "children": [] } })));
    let app = router_with(transport, MockProvider::echo(), None);

    let (status, _, v) = send(app, get("/api/reddit")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v["isLive"], false);
    assert_eq!(v["posts"], json!([]));
    assert_eq!(
        v["attempts"],
        json!([
            { "source": "www.reddit.com", "error": "timed out after 10000 ms" },
            { "source": "old.reddit.com", "error": "empty result" }
        ])
    );
    assert!(v["error"].as_str().unwrap().starts_with("all 2 sources failed"));
}

#[tokio::test]
async fn comments_require_valid_ids() {
    let (status, _, v) = send(test_router(), get("/api/comments?postId=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "postId and subreddit required");

    let (status, _, _) = send(
        test_router(),
        get("/api/comments?postId=abc&subreddit=..%2Fetc"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn comments_are_flattened_and_capped() {
    let (status, _, v) = send(
        test_router(),
        get("/api/comments?postId=1a0003&subreddit=explainlikeimfive"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["source"], "Reddit direct");
    assert_eq!(v["total"], 3);
    let comments = v["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["id"], "c1");
    assert_eq!(comments[1]["id"], "c3");
    assert_eq!(comments[1]["depth"], 2);
}

#[tokio::test]
async fn transform_rejects_short_text() {
    let (status, _, v) = send(
        test_router(),
        post_json("/api/transform", json!({ "text": " a " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "Text too short");
}

#[tokio::test]
async fn transform_miss_then_hit() {
    let app = test_router();
    let payload = json!({ "text": "ngl this slaps", "subredditContext": "music" });

    let (status, headers, v) = send(app.clone(), post_json("/api/transform", payload.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-transform-cache").unwrap(), "MISS");
    assert_eq!(v["sentences"][0]["original"], "ngl this slaps");

    let (_, headers, v2) = send(app, post_json("/api/transform", payload)).await;
    assert_eq!(headers.get("x-transform-cache").unwrap(), "HIT");
    assert_eq!(v, v2);
}

#[tokio::test]
async fn transform_without_credential_is_500() {
    let app = router_with(
        healthy_transport(),
        MockProvider::new(|_| Err(GatewayError::MissingCredential)),
        None,
    );
    let (status, _, v) = send(app, post_json("/api/transform", json!({ "text": "hello there" }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v["error"], "API key not configured");
}

#[tokio::test]
async fn transform_unparseable_output_degrades_to_original() {
    let app = router_with(
        healthy_transport(),
        MockProvider::new(|_| Ok("I cannot help with that.".to_string())),
        None,
    );
    let (status, _, v) = send(app, post_json("/api/transform", json!({ "text": "hello there" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["sentences"][0]["simplified"], "hello there");
    assert_eq!(v["sentences"][0]["korean"], "[변환 실패 - 원문 표시]");
    assert_eq!(v["sentences"][0]["slang_notes"], json!([]));
}

#[tokio::test]
async fn batch_keeps_input_order_and_isolates_failures() {
    let app = router_with(
        healthy_transport(),
        MockProvider::new(|user| {
            if user.contains("explode") {
                Err(GatewayError::Upstream {
                    status: 529,
                    message: "overloaded".into(),
                })
            } else {
                reddit_english_feed::transform::provider::echo_reply(user)
            }
        }),
        None,
    );
    let payload = json!([
        { "text": "first text" },
        { "text": "please explode" },
        { "text": "third text" }
    ]);
    let (status, _, v) = send(app, post_json("/api/transform/batch", payload)).await;
    assert_eq!(status, StatusCode::OK);
    let items = v.as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["sentences"][0]["original"], "first text");
    assert_eq!(items[1]["sentences"][0]["korean"], "[에러 발생]");
    assert!(items[1]["error"].is_string());
    assert_eq!(items[2]["sentences"][0]["original"], "third text");
    assert!(items[2].get("error").is_none());
}

#[tokio::test]
async fn oversized_batch_is_rejected_before_any_model_call() {
    let app = router_with(
        healthy_transport(),
        MockProvider::new(|_| panic!("model must not be called")),
        None,
    );
    let items: Vec<Value> = (0..11).map(|i| json!({ "text": format!("text {i}") })).collect();
    let (status, _, v) = send(app, post_json("/api/transform/batch", Value::Array(items))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "Too many items: 11 (max 10)");
}

#[tokio::test]
async fn word_lookup_returns_entry() {
    let (status, headers, v) = send(
        test_router(),
        post_json("/api/word", json!({ "word": "rizz" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["word"], "rizz");
    assert_eq!(headers.get("x-transform-cache").unwrap(), "MISS");

    let (status, _, v) = send(test_router(), post_json("/api/word", json!({ "word": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "Word is required");
}

#[tokio::test]
async fn cache_api_without_kv_tells_client_to_use_local() {
    let (status, _, v) = send(test_router(), get("/api/cache?action=status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["kvEnabled"], false);

    let (_, _, v) = send(test_router(), get("/api/cache?action=get&key=abc")).await;
    assert_eq!(v["useLocal"], true);
}

#[tokio::test]
async fn cache_api_set_then_get() {
    let kv: SharedKv = Arc::new(MemoryKv::new());
    let app = router_with(healthy_transport(), MockProvider::echo(), Some(kv));

    let (status, _, v) = send(
        app.clone(),
        post_json("/api/cache?action=set&key=post_1", json!({ "value": { "n": 1 } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"], true);

    let (_, _, v) = send(app.clone(), get("/api/cache?action=get&key=post_1")).await;
    assert_eq!(v["found"], true);
    assert_eq!(v["value"], r#"{"n":1}"#);

    let (status, _, v) = send(app, get("/api/cache?action=nope")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "Invalid action");
}
