// src/config/mod.rs
//! Runtime configuration: feed sources/policy (TOML) and the text-transform provider (JSON).

pub mod ai;
pub mod feed;

pub use ai::AiConfig;
pub use feed::FeedConfig;
