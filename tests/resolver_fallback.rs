// tests/resolver_fallback.rs
//
// Fallback ordering of the multi-source resolver against a canned transport.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fixture, StubTransport, HOT, PULLPUSH, THREAD};
use reddit_english_feed::feed::normalize::NormalizePolicy;
use reddit_english_feed::feed::registry::SourceRegistry;
use reddit_english_feed::feed::types::{FeedItems, FeedRequest, SourceDescriptor, SourceKind};
use reddit_english_feed::{resolve, FeedClient, FetchError};
use serde_json::json;

fn listing(base: &str) -> SourceKind {
    SourceKind::RedditListing {
        base: base.to_string(),
        feed: "popular".to_string(),
        json_suffix: true,
        page_size: 50,
    }
}

fn posts_req(limit: usize) -> FeedRequest {
    FeedRequest::Posts { limit, after: None }
}

fn registry(sources: Vec<SourceDescriptor>) -> SourceRegistry {
    SourceRegistry::new(sources, NormalizePolicy::default())
}

#[tokio::test]
async fn falls_through_timeout_and_http_error_to_third_source() {
    let reg = registry(vec![
        SourceDescriptor::new("SourceA", listing("https://a.test")),
        SourceDescriptor::new("SourceB", listing("https://b.test")),
        SourceDescriptor::new("SourceC", listing("https://c.test")),
    ]);
    let transport = StubTransport::new()
        .route("a.test", Err(FetchError::Timeout(10_000)))
        .route("b.test", Err(FetchError::HttpStatus { status: 500 }))
        .route("c.test", Ok(fixture(HOT)));

    let got = resolve(&posts_req(25), &reg, &transport).await.expect("SourceC answers");
    assert_eq!(got.source, "SourceC");
    match &got.page.items {
        // 5 children: one NSFW and one too-short title are dropped.
        FeedItems::Posts(p) => {
            let ids: Vec<_> = p.iter().map(|p| p.id.as_str()).collect();
            assert_eq!(ids, ["1a0001", "1a0003", "1a0005"]);
        }
        other => panic!("expected posts, got {other:?}"),
    }
    assert_eq!(got.page.cursor.as_deref(), Some("t3_1abcdef"));
    assert_eq!(transport.calls().len(), 3);
}

#[tokio::test]
async fn first_success_stops_the_pass() {
    let reg = registry(vec![
        SourceDescriptor::new("first", listing("https://first.test")),
        SourceDescriptor::new("second", listing("https://second.test")),
    ]);
    let transport = StubTransport::new()
        .route("first.test", Ok(fixture(HOT)))
        .route("second.test", Ok(fixture(HOT)));

    let got = resolve(&posts_req(2), &reg, &transport).await.unwrap();
    assert_eq!(got.source, "first");
    assert_eq!(got.page.items.len(), 2, "limit caps the normalized page");
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn single_empty_source_reports_one_empty_attempt() {
    let reg = registry(vec![SourceDescriptor::new("only", listing("https://only.test"))]);
    let transport = StubTransport::new().route(
        "only.test",
        Ok(json!({ "data": { "children": [], "after": null } })),
    );

    let err = resolve(&posts_req(25), &reg, &transport).await.unwrap_err();
    assert_eq!(err.attempts.len(), 1);
    assert_eq!(err.attempts[0].source, "only");
    assert_eq!(err.attempts[0].error, FetchError::EmptyResult);
    assert_eq!(err.attempts[0].error.to_string(), "empty result");
}

#[tokio::test]
async fn all_failing_records_every_source_in_order() {
    let reg = registry(vec![
        SourceDescriptor::new("A", listing("https://a.test")),
        SourceDescriptor::new("B", listing("https://b.test")),
        SourceDescriptor::new("C", listing("https://c.test")),
        // Wrong shape for posts: counted, never fetched.
        SourceDescriptor::new(
            "D",
            SourceKind::PullPushComments {
                base: "https://d.test".into(),
            },
        ),
    ]);
    let transport = StubTransport::new()
        .route("a.test", Err(FetchError::Network("connection reset".into())))
        .route("b.test", Ok(json!("<html>blocked</html>")))
        .route("c.test", Err(FetchError::HttpStatus { status: 429 }));

    let err = resolve(&posts_req(25), &reg, &transport).await.unwrap_err();
    let names: Vec<_> = err.attempts.iter().map(|a| a.source.as_str()).collect();
    assert_eq!(names, ["A", "B", "C", "D"]);
    assert_eq!(err.attempts.len(), reg.len());
    assert_eq!(err.attempts[1].error, FetchError::EmptyResult);
    assert!(matches!(err.attempts[3].error, FetchError::Unsupported("posts")));
    assert_eq!(transport.calls().len(), 3);

    let msg = err.to_string();
    assert!(msg.starts_with("all 4 sources failed"), "{msg}");
    assert!(msg.contains("C: HTTP 429"), "{msg}");

    let body = serde_json::to_value(&err.attempts).unwrap();
    assert_eq!(body[2]["error"], "HTTP 429");
}

#[tokio::test]
async fn every_attempt_gets_a_fresh_deadline() {
    // Stub ignores the timeout; this checks the resolver passes a per-source value.
    let reg = registry(vec![
        SourceDescriptor::new("slow", listing("https://slow.test")).with_timeout_ms(5),
        SourceDescriptor::new("ok", listing("https://ok.test")),
    ])
    .with_default_timeout(Duration::from_millis(250));
    assert_eq!(reg.sources()[0].timeout(reg.default_timeout()), Duration::from_millis(5));
    assert_eq!(reg.sources()[1].timeout(reg.default_timeout()), Duration::from_millis(250));

    let transport = StubTransport::new()
        .route("slow.test", Err(FetchError::Timeout(5)))
        .route("ok.test", Ok(fixture(HOT)));
    let got = resolve(&posts_req(25), &reg, &transport).await.unwrap();
    assert_eq!(got.source, "ok");
}

#[tokio::test]
async fn comments_fall_back_from_archive_to_thread_and_flatten() {
    let comments = registry(vec![
        SourceDescriptor::new(
            "PullPush",
            SourceKind::PullPushComments {
                base: "https://pullpush.test".into(),
            },
        ),
        SourceDescriptor::new(
            "Reddit direct",
            SourceKind::RedditThread {
                base: "https://reddit.test".into(),
            },
        ),
    ]);
    let transport = StubTransport::new()
        .route("pullpush.test", Ok(json!({ "data": [] })))
        .route("reddit.test", Ok(fixture(THREAD)));
    let client = FeedClient::new(registry(Vec::new()), comments, Arc::new(transport));

    let page = client.get_comments("1a0003", "explainlikeimfive", 15).await.unwrap();
    assert_eq!(page.source, "Reddit direct");
    let flat: Vec<_> = page
        .comments
        .iter()
        .map(|c| (c.id.as_str(), c.depth))
        .collect();
    // c2 is removed but its reply survives at its own depth.
    assert_eq!(flat, [("c1", 0), ("c3", 2), ("c4", 0)]);
}

#[tokio::test]
async fn archive_comments_are_decoded_and_filtered() {
    let comments = registry(vec![SourceDescriptor::new(
        "PullPush",
        SourceKind::PullPushComments {
            base: "https://pullpush.test".into(),
        },
    )]);
    let transport = StubTransport::new().route("pullpush.test", Ok(fixture(PULLPUSH)));
    let client = FeedClient::new(registry(Vec::new()), comments, Arc::new(transport));

    let page = client.get_comments("1a0003", "explainlikeimfive", 15).await.unwrap();
    assert_eq!(page.source, "PullPush");
    let bodies: Vec<_> = page.comments.iter().map(|c| c.body.as_str()).collect();
    assert_eq!(bodies, ["Rayleigh scattering & stuff", "no cap the best answer"]);
    assert!(page.comments.iter().all(|c| c.depth == 0));
}

#[tokio::test]
async fn posts_page_carries_cursor_and_source() {
    let posts = registry(vec![SourceDescriptor::new("www", listing("https://www.test"))]);
    let transport = Arc::new(StubTransport::new().route("www.test", Ok(fixture(HOT))));
    let client = FeedClient::new(posts, registry(Vec::new()), transport.clone());

    let page = client.get_posts(25, Some("t3_prev".into())).await.unwrap();
    assert_eq!(page.source, "www");
    assert_eq!(page.after.as_deref(), Some("t3_1abcdef"));
    assert_eq!(page.posts.len(), 3);
    assert!(transport.calls()[0].contains("after=t3_prev"));

    let video = &page.posts[2];
    assert!(video.is_video);
    assert!(video.media.is_some());
    assert!(video.preview.is_some());
    assert_eq!(video.score, 0);
}

#[tokio::test]
async fn unsafe_comment_ids_never_reach_the_network() {
    let comments = registry(vec![
        SourceDescriptor::new(
            "PullPush",
            SourceKind::PullPushComments {
                base: "https://pullpush.test".into(),
            },
        ),
        SourceDescriptor::new(
            "Reddit direct",
            SourceKind::RedditThread {
                base: "https://reddit.test".into(),
            },
        ),
    ]);
    let transport = Arc::new(
        StubTransport::new()
            .route("pullpush.test", Ok(fixture(PULLPUSH)))
            .route("reddit.test", Ok(fixture(THREAD))),
    );
    let client = FeedClient::new(registry(Vec::new()), comments, transport.clone());

    let err = client
        .get_comments("1a0003?sort=new", "rust/../admin", 15)
        .await
        .unwrap_err();
    assert_eq!(err.attempts.len(), 2);
    assert!(err
        .attempts
        .iter()
        .all(|a| matches!(a.error, FetchError::InvalidRequest(_))));
    assert!(transport.calls().is_empty());
}
