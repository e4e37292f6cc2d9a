// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod transform;

pub use crate::api::{router, AppState};
pub use crate::error::{AllSourcesFailed, FetchError, GatewayError, SourceAttempt};
pub use crate::feed::{resolve, CommentsPage, FeedClient, PostsPage, Resolved};

use axum::Router;

/// Full in-process app: API routes from env/config, plus `/metrics`.
pub async fn app() -> anyhow::Result<Router> {
    let state = AppState::from_env()?;
    let mut router = api::router(state);
    if let Some(m) = metrics::global() {
        router = router.merge(m.router());
    }
    Ok(router)
}
