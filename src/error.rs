// src/error.rs
//! Error types for the feed resolver and the transform gateway.

use serde::Serialize;
use thiserror::Error;

/// Failure of one attempt against one source. Always recovered by the resolver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("invalid body: {0}")]
    InvalidBody(String),

    #[error("network error: {0}")]
    Network(String),

    /// Request parameters that cannot be placed in an upstream URL.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("source cannot serve {0} requests")]
    Unsupported(&'static str),

    #[error("empty result")]
    EmptyResult,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return FetchError::HttpStatus {
                status: status.as_u16(),
            };
        }
        FetchError::Network(err.to_string())
    }
}

/// One recorded failure: which source, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceAttempt {
    pub source: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: FetchError,
}

fn serialize_display<S: serde::Serializer>(err: &FetchError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(err)
}

/// Every source in the registry failed or returned nothing usable.
#[derive(Debug, Clone, Error)]
#[error("all {} sources failed{}", attempts.len(), summary(attempts))]
pub struct AllSourcesFailed {
    pub attempts: Vec<SourceAttempt>,
}

fn summary(attempts: &[SourceAttempt]) -> String {
    if attempts.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = attempts
        .iter()
        .map(|a| format!("{}: {}", a.source, a.error))
        .collect();
    format!(" ({})", parts.join("; "))
}

/// Failure of the text-transform collaborator.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No API key provisioned. Configuration problem; never retried.
    #[error("API key not configured")]
    MissingCredential,

    #[error("Text too short")]
    TextTooShort,

    /// `enabled = false` in the AI config.
    #[error("AI transform disabled")]
    Disabled,

    #[error("upstream error (status {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    /// The model answered, but not with the JSON we asked for.
    #[error("unparseable model output: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Parse(err.to_string())
    }
}
