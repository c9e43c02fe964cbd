// src/ingest/types.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw upstream record, decoded loosely. Every field access goes through
/// the normalizer with an explicit default.
pub type RawTopic = serde_json::Value;
pub type RawReply = serde_json::Value;

/// Canonical topic after normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
    pub id: u64,
    pub title: String,
    pub url: String,
    pub author: String,
    pub reply_count: u32,
    pub created_at: DateTime<Utc>,
    /// Node the topic was fetched under; empty for the hot pool.
    pub source_node: String,
    // Enrichment fields: empty until the enricher fills them in.
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub comments_summary: String,
    #[serde(default)]
    pub featured_comments: Vec<FeaturedComment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeaturedComment {
    pub author: String,
    pub text: String,
}

/// Normalized reply, used only as enrichment input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub author: String,
    pub content: String,
}

fn default_emoji() -> String {
    "📌".to_string()
}

/// A fetchable node plus its display label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeConfig {
    pub name: String,
    /// Display title; falls back to `name` when empty.
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_emoji")]
    pub emoji: String,
}

impl NodeConfig {
    pub fn new(name: &str, title: &str, emoji: &str) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            emoji: emoji.to_string(),
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.name
        } else {
            &self.title
        }
    }

    pub fn display_label(&self) -> String {
        format!("{} {}", self.emoji, self.display_title())
    }

    /// Synthetic config of the site-wide hot pool.
    pub fn hot() -> Self {
        Self::new(HOT_POOL_KEY, "全站热门", "🔥")
    }
}

pub const HOT_POOL_KEY: &str = "_hot";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolKey {
    Hot,
    Node(String),
}

impl PoolKey {
    pub fn as_str(&self) -> &str {
        match self {
            PoolKey::Hot => HOT_POOL_KEY,
            PoolKey::Node(name) => name,
        }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestPool {
    pub key: PoolKey,
    pub config: NodeConfig,
    pub topics: Vec<Topic>,
}

/// Pools in rendering order: hot first, then nodes in configured order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestResult {
    pub pools: Vec<DigestPool>,
}

impl DigestResult {
    pub fn total(&self) -> usize {
        self.pools.iter().map(|p| p.topics.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn pool(&self, key: &str) -> Option<&DigestPool> {
        self.pools.iter().find(|p| p.key.as_str() == key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.pools.iter().map(|p| p.key.as_str()).collect()
    }

    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.pools.iter().flat_map(|p| p.topics.iter())
    }

    pub fn topics_mut(&mut self) -> impl Iterator<Item = &mut Topic> {
        self.pools.iter_mut().flat_map(|p| p.topics.iter_mut())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
}

/// One upstream forum API. `None` node means the site-wide hot list.
#[async_trait::async_trait]
pub trait TopicSource: Send + Sync {
    async fn fetch_topics(
        &self,
        node: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RawTopic>, SourceError>;

    async fn fetch_replies(&self, topic_id: u64, limit: usize)
        -> Result<Vec<RawReply>, SourceError>;

    fn name(&self) -> &str;
}
