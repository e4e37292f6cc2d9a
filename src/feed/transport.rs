// src/feed/transport.rs
use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;

pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";

/// One bounded GET per call. No retries here; the resolver moves on instead.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_raw(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Value, FetchError>;
}

/// `reqwest`-backed transport with browser-like default headers.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    default_headers: BTreeMap<String, String>,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        let mut default_headers = BTreeMap::new();
        default_headers.insert("User-Agent".to_string(), BROWSER_USER_AGENT.to_string());
        default_headers.insert("Accept".to_string(), DEFAULT_ACCEPT.to_string());
        Self {
            client,
            default_headers,
        }
    }

    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    async fn get_text(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<String, FetchError> {
        let mut req = self.client.get(url);
        for (k, v) in self.default_headers.iter() {
            if !headers.keys().any(|h| h.eq_ignore_ascii_case(k)) {
                req = req.header(k.as_str(), v.as_str());
            }
        }
        for (k, v) in headers {
            req = req.header(k.as_str(), v.as_str());
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
            });
        }
        Ok(resp.text().await?)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_raw(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Value, FetchError> {
        // Dropping the inner future on expiry aborts the in-flight request.
        let text = match tokio::time::timeout(timeout, self.get_text(url, headers)).await {
            Ok(res) => res?,
            Err(_) => return Err(FetchError::Timeout(timeout.as_millis() as u64)),
        };
        decode_body(&text)
    }
}

/// Decode a response body, unwrapping the `{"contents": "<json string>"}`
/// envelope some CORS proxies put around the target response.
pub fn decode_body(text: &str) -> Result<Value, FetchError> {
    let v: Value = serde_json::from_str(text.trim_start_matches('\u{feff}'))
        .map_err(|e| FetchError::InvalidBody(e.to_string()))?;

    match v.get("contents").and_then(Value::as_str) {
        Some(inner) if v.get("data").is_none() => serde_json::from_str(inner)
            .map_err(|e| FetchError::InvalidBody(format!("proxy contents: {e}"))),
        _ => Ok(v),
    }
}
