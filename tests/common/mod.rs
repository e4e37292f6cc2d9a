// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reddit_english_feed::feed::transport::Transport;
use reddit_english_feed::FetchError;
use serde_json::Value;

pub const HOT: &str = include_str!("../fixtures/reddit_hot.json");
pub const THREAD: &str = include_str!("../fixtures/reddit_thread.json");
pub const PULLPUSH: &str = include_str!("../fixtures/pullpush_comments.json");

pub fn fixture(s: &str) -> Value {
    serde_json::from_str(s).expect("fixture json")
}

/// Canned transport: first route whose needle occurs in the URL answers.
#[derive(Default)]
pub struct StubTransport {
    routes: Vec<(String, Result<Value, FetchError>)>,
    calls: Mutex<Vec<String>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, needle: &str, reply: Result<Value, FetchError>) -> Self {
        self.routes.push((needle.to_string(), reply));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn fetch_raw(
        &self,
        url: &str,
        _headers: &BTreeMap<String, String>,
        _timeout: Duration,
    ) -> Result<Value, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.routes
            .iter()
            .find(|(needle, _)| url.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Err(FetchError::Network(format!("no stub route for {url}"))))
    }
}
