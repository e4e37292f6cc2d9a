// src/feed/normalize.rs
//! Canonical normalizer: filtering policy for posts, depth-bounded flattening for comments.

use serde::{Deserialize, Serialize};

use crate::feed::shapes::{RawArchiveComment, RawComment, RawPost, RawThing};
use crate::feed::types::{Comment, Post};

pub const DEFAULT_MIN_TITLE_CHARS: usize = 4;
pub const DEFAULT_SELFTEXT_MAX_CHARS: usize = 500;
pub const DEFAULT_MAX_COMMENT_DEPTH: u32 = 3;

/// What happens to the replies of a deleted/removed comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovedReplies {
    /// Hide the removed node, still surface its replies.
    #[default]
    Keep,
    /// Hide the removed node and everything below it.
    Drop,
}

/// Content block-list. Subreddits match case-insensitively; keywords are
/// case-insensitive substrings of the title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockList {
    pub subreddits: Vec<String>,
    pub keywords: Vec<String>,
}

impl BlockList {
    pub fn is_empty(&self) -> bool {
        self.subreddits.is_empty() && self.keywords.is_empty()
    }

    pub fn blocks(&self, subreddit: &str, title: &str) -> bool {
        if self
            .subreddits
            .iter()
            .any(|s| s.eq_ignore_ascii_case(subreddit))
        {
            return true;
        }
        if self.keywords.is_empty() {
            return false;
        }
        let title = title.to_lowercase();
        self.keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .any(|k| !k.is_empty() && title.contains(&k))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizePolicy {
    pub min_title_chars: usize,
    pub selftext_max_chars: usize,
    pub max_comment_depth: u32,
    pub removed_replies: RemovedReplies,
    pub block_list: BlockList,
}

impl Default for NormalizePolicy {
    fn default() -> Self {
        Self {
            min_title_chars: DEFAULT_MIN_TITLE_CHARS,
            selftext_max_chars: DEFAULT_SELFTEXT_MAX_CHARS,
            max_comment_depth: DEFAULT_MAX_COMMENT_DEPTH,
            removed_replies: RemovedReplies::Keep,
            block_list: BlockList::default(),
        }
    }
}

/// Keep at most `max` chars (Unicode scalar values).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

fn epoch_or_now(ts: Option<f64>) -> i64 {
    ts.filter(|t| t.is_finite())
        .map(|t| t as i64)
        .unwrap_or_else(now_unix)
}

fn is_removed(body: Option<&str>) -> bool {
    match body {
        None => true,
        Some(b) => {
            let b = b.trim();
            b.is_empty() || b == "[deleted]" || b == "[removed]"
        }
    }
}

/// Map a single post, or `None` if policy excludes it.
pub fn normalize_post(p: &RawPost, policy: &NormalizePolicy) -> Option<Post> {
    if p.over_18.unwrap_or(false) {
        return None;
    }
    let title = p.title.as_deref()?;
    if title.trim().chars().count() < policy.min_title_chars {
        return None;
    }
    let id = p.id.clone()?;
    let subreddit = p.subreddit.clone().unwrap_or_default();
    if policy.block_list.blocks(&subreddit, title) {
        return None;
    }

    Some(Post {
        id,
        title: title.to_string(),
        subreddit,
        score: p.score.unwrap_or(0),
        num_comments: p.num_comments.unwrap_or(0),
        created_utc: epoch_or_now(p.created_utc),
        author: p.author.clone().unwrap_or_default(),
        permalink: p.permalink.clone().unwrap_or_default(),
        url: p.url.clone().unwrap_or_default(),
        thumbnail: p.thumbnail.clone().unwrap_or_default(),
        preview: p.preview.clone().filter(|v| !v.is_null()),
        selftext: truncate_chars(
            p.selftext.as_deref().unwrap_or_default(),
            policy.selftext_max_chars,
        ),
        is_video: p.is_video.unwrap_or(false),
        media: p.media.clone().filter(|v| !v.is_null()),
        post_hint: p.post_hint.clone(),
    })
}

/// Filter listing children down to at most `limit` canonical posts, order preserved.
pub fn normalize_posts(children: &[RawThing], policy: &NormalizePolicy, limit: usize) -> Vec<Post> {
    children
        .iter()
        .filter_map(|c| match c {
            RawThing::Post(p) => normalize_post(p, policy),
            _ => None,
        })
        .take(limit)
        .collect()
}

fn to_comment(c: &RawComment, body: &str, depth: u32) -> Option<Comment> {
    Some(Comment {
        id: c.id.clone()?,
        body: body.to_string(),
        author: c.author.clone().unwrap_or_default(),
        score: c.score.unwrap_or(0),
        created_utc: epoch_or_now(c.created_utc),
        depth,
    })
}

/// Pre-order, depth-bounded flattening of a Reddit reply tree.
pub fn flatten_comments(children: &[RawThing], policy: &NormalizePolicy) -> Vec<Comment> {
    let mut out = Vec::new();
    flatten_into(children, 0, policy, &mut out);
    out
}

fn flatten_into(children: &[RawThing], depth: u32, policy: &NormalizePolicy, out: &mut Vec<Comment>) {
    for child in children {
        let RawThing::Comment(c) = child else {
            continue;
        };
        let removed = is_removed(c.body.as_deref());
        if !removed {
            if let Some(comment) = to_comment(c, c.body.as_deref().unwrap_or_default(), depth) {
                out.push(comment);
            }
        } else if policy.removed_replies == RemovedReplies::Drop {
            continue;
        }
        if depth < policy.max_comment_depth {
            flatten_into(&c.replies(), depth + 1, policy, out);
        }
    }
}

/// Archive mirror hits are flat: everything is depth 0. Bodies arrive HTML-escaped.
pub fn normalize_archive_comments(raw: &[RawArchiveComment]) -> Vec<Comment> {
    raw.iter()
        .filter(|c| !is_removed(c.body.as_deref()))
        .filter_map(|c| {
            Some(Comment {
                id: c.id.clone()?,
                body: html_escape::decode_html_entities(c.body.as_deref()?).to_string(),
                author: c.author.clone().unwrap_or_default(),
                score: c.score.unwrap_or(0),
                created_utc: epoch_or_now(c.created_utc),
                depth: 0,
            })
        })
        .collect()
}
