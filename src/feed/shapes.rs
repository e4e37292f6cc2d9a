// src/feed/shapes.rs
//! Typed decoders for each upstream response shape.
//!
//! Children are decoded one by one from `serde_json::Value` so a single odd
//! entry (unknown `kind`, wrong field type) drops that entry, not the page.

use serde::Deserialize;
use serde_json::Value;

/// Reddit `t3` payload. Every field is optional upstream.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPost {
    pub id: Option<String>,
    pub title: Option<String>,
    pub selftext: Option<String>,
    pub author: Option<String>,
    pub subreddit: Option<String>,
    pub score: Option<i64>,
    pub num_comments: Option<i64>,
    pub created_utc: Option<f64>,
    pub permalink: Option<String>,
    pub url: Option<String>,
    pub thumbnail: Option<String>,
    pub preview: Option<Value>,
    pub is_video: Option<bool>,
    pub media: Option<Value>,
    pub post_hint: Option<String>,
    pub over_18: Option<bool>,
}

/// Reddit `t1` payload. `replies` is `""` when empty, a listing otherwise.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawComment {
    pub id: Option<String>,
    pub body: Option<String>,
    pub author: Option<String>,
    pub score: Option<i64>,
    pub created_utc: Option<f64>,
    pub replies: Value,
}

impl RawComment {
    pub fn replies(&self) -> Vec<RawThing> {
        decode_listing(&self.replies)
            .map(|l| l.children)
            .unwrap_or_default()
    }
}

/// PullPush comment search hit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawArchiveComment {
    pub id: Option<String>,
    pub body: Option<String>,
    pub author: Option<String>,
    pub score: Option<i64>,
    pub created_utc: Option<f64>,
}

#[derive(Debug, Clone)]
pub enum RawThing {
    Post(RawPost),
    Comment(RawComment),
    /// `more` stubs and anything else we do not render.
    Other,
}

pub fn decode_thing(v: &Value) -> RawThing {
    let data = match v.get("data") {
        Some(d) => d,
        None => return RawThing::Other,
    };
    match v.get("kind").and_then(Value::as_str) {
        Some("t3") => RawPost::deserialize(data)
            .map(RawThing::Post)
            .unwrap_or(RawThing::Other),
        Some("t1") => RawComment::deserialize(data)
            .map(RawThing::Comment)
            .unwrap_or(RawThing::Other),
        _ => RawThing::Other,
    }
}

#[derive(Debug, Clone)]
pub struct RawListing {
    pub children: Vec<RawThing>,
    pub after: Option<String>,
}

/// `{ data: { children: [...], after } }`
pub fn decode_listing(v: &Value) -> Option<RawListing> {
    let data = v.get("data")?;
    let children = data.get("children")?.as_array()?;
    let after = data
        .get("after")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Some(RawListing {
        children: children.iter().map(decode_thing).collect(),
        after,
    })
}

/// Thread endpoint returns `[post_listing, comment_listing]`.
pub fn decode_thread(v: &Value) -> Option<RawListing> {
    let arr = v.as_array()?;
    decode_listing(arr.get(1)?)
}

/// `{ data: [ {...}, ... ] }`; an empty array means the mirror has nothing.
pub fn decode_pullpush(v: &Value) -> Option<Vec<RawArchiveComment>> {
    let arr = v.get("data")?.as_array()?;
    if arr.is_empty() {
        return None;
    }
    Some(
        arr.iter()
            .filter_map(|c| RawArchiveComment::deserialize(c).ok())
            .collect(),
    )
}
