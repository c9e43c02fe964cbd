// src/ingest/mod.rs
//! Aggregation: hot pool + node pools → one `DigestResult`.
//!
//! Fetching may run concurrently; cross-pool dedup never does. All fetches
//! complete first, then `fold_pools` walks the pools in configured order and
//! threads the running id set through them.

pub mod config;
pub mod normalize;
pub mod providers;
pub mod types;

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use futures_util::stream::{self, StreamExt};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

use crate::ingest::normalize::{is_recent, normalize_all};
use crate::ingest::types::{DigestPool, DigestResult, NodeConfig, PoolKey, Topic, TopicSource};

pub use crate::ingest::normalize::{clean_title, normalize, normalize_text};

pub const HOT_LIMIT: usize = 20;
pub const NODE_FETCH_LIMIT: usize = 20;
pub const NODE_POOL_CAP: usize = 10;
pub const RECENCY_WINDOW_HOURS: i64 = 48;
pub const DEFAULT_BASE_URL: &str = "https://www.v2ex.com";

/// One-time metrics registration (so series show up in the textfile).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_topics_fetched_total", "Raw records returned by the source.");
        describe_counter!(
            "digest_invalid_records_total",
            "Records skipped because they carry no usable id."
        );
        describe_counter!(
            "digest_recency_filtered_total",
            "Node-pool topics dropped by the recency window."
        );
        describe_counter!("digest_dedup_total", "Topics dropped as cross-pool duplicates.");
        describe_counter!("digest_topics_kept_total", "Topics kept in the final digest.");
        describe_counter!("digest_fetch_errors_total", "Source fetch failures, by source.");
        describe_histogram!("digest_fetch_ms", "Upstream fetch time in milliseconds.");
        describe_gauge!("digest_last_run_ts", "Unix ts when aggregation last ran.");
    });
}

#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub hot_limit: usize,
    pub node_fetch_limit: usize,
    pub node_pool_cap: usize,
    pub recency_window: Duration,
    pub rank_by_popularity: bool,
    pub with_dedup: bool,
    /// Hot ranking already implies freshness upstream; off by default.
    pub filter_hot_by_recency: bool,
    /// Max node fetches in flight; 1 means sequential.
    pub fetch_concurrency: usize,
    pub base_url: String,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            hot_limit: HOT_LIMIT,
            node_fetch_limit: NODE_FETCH_LIMIT,
            node_pool_cap: NODE_POOL_CAP,
            recency_window: Duration::hours(RECENCY_WINDOW_HOURS),
            rank_by_popularity: false,
            with_dedup: true,
            filter_hot_by_recency: false,
            fetch_concurrency: 4,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Candidates of one node after normalize/filter/rank, before dedup + cap.
#[derive(Debug, Clone)]
pub struct NodeCandidates {
    pub config: NodeConfig,
    pub topics: Vec<Topic>,
}

/// Stable descending sort by replies; ties keep upstream order.
pub fn rank_by_replies(topics: &mut [Topic]) {
    topics.sort_by(|a, b| b.reply_count.cmp(&a.reply_count));
}

/// Retain only topics inside the window. Returns how many were dropped.
pub fn filter_recent(topics: &mut Vec<Topic>, now: DateTime<Utc>, window: Duration) -> usize {
    let before = topics.len();
    topics.retain(|t| is_recent(t, now, window));
    before - topics.len()
}

/// Take topics in order, skipping ids already claimed (by earlier pools or
/// earlier in this pool), up to `cap`. Claims the survivors in `seen`.
fn claim(topics: Vec<Topic>, seen: &mut HashSet<u64>, cap: usize, with_dedup: bool) -> (Vec<Topic>, usize) {
    let mut local = HashSet::new();
    let mut out = Vec::with_capacity(cap.min(topics.len()));
    let mut dropped = 0usize;
    for t in topics {
        let dup = (with_dedup && seen.contains(&t.id)) || !local.insert(t.id);
        if dup {
            dropped += 1;
            continue;
        }
        if out.len() < cap {
            out.push(t);
        }
    }
    if with_dedup {
        seen.extend(out.iter().map(|t| t.id));
    }
    (out, dropped)
}

/// Deterministic sequential reduction over pools in order: hot first, then
/// nodes exactly as configured. Empty pools are kept.
pub fn fold_pools(hot: Vec<Topic>, nodes: Vec<NodeCandidates>, opts: &AggregateOptions) -> DigestResult {
    let mut seen: HashSet<u64> = HashSet::new();
    let mut pools = Vec::with_capacity(nodes.len() + 1);

    let (hot_topics, hot_dups) = claim(hot, &mut seen, opts.hot_limit, opts.with_dedup);
    counter!("digest_dedup_total").increment(hot_dups as u64);
    pools.push(DigestPool {
        key: PoolKey::Hot,
        config: NodeConfig::hot(),
        topics: hot_topics,
    });

    for cand in nodes {
        let (topics, dups) = claim(cand.topics, &mut seen, opts.node_pool_cap, opts.with_dedup);
        if dups > 0 {
            tracing::debug!(target: "ingest", node = %cand.config.name, dups, "duplicates removed");
        }
        counter!("digest_dedup_total").increment(dups as u64);
        pools.push(DigestPool {
            key: PoolKey::Node(cand.config.name.clone()),
            config: cand.config,
            topics,
        });
    }

    DigestResult { pools }
}

async fn fetch_hot(source: &dyn TopicSource, opts: &AggregateOptions, now: DateTime<Utc>) -> Vec<Topic> {
    let raw = match source.fetch_topics(None, opts.hot_limit).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(target: "ingest", error = %e, provider = source.name(), "hot pool fetch failed");
            counter!("digest_fetch_errors_total", "source" => "hot").increment(1);
            return Vec::new();
        }
    };
    let mut topics = normalize_all(&raw, "", &opts.base_url);
    if opts.filter_hot_by_recency {
        let dropped = filter_recent(&mut topics, now, opts.recency_window);
        counter!("digest_recency_filtered_total").increment(dropped as u64);
    }
    topics
}

async fn fetch_node(
    source: &dyn TopicSource,
    node: NodeConfig,
    opts: &AggregateOptions,
    now: DateTime<Utc>,
) -> NodeCandidates {
    let raw = match source.fetch_topics(Some(&node.name), opts.node_fetch_limit).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(target: "ingest", error = %e, node = %node.name, "node fetch failed");
            counter!("digest_fetch_errors_total", "source" => node.name.clone()).increment(1);
            return NodeCandidates {
                config: node,
                topics: Vec::new(),
            };
        }
    };

    let mut topics = normalize_all(&raw, &node.name, &opts.base_url);
    let dropped = filter_recent(&mut topics, now, opts.recency_window);
    counter!("digest_recency_filtered_total").increment(dropped as u64);
    if opts.rank_by_popularity {
        rank_by_replies(&mut topics);
    }

    tracing::info!(
        target: "ingest",
        node = %node.name,
        fetched = raw.len(),
        recent = topics.len(),
        "node fetched"
    );
    NodeCandidates { config: node, topics }
}

/// Run one aggregation. Never fails: unreachable sources become empty pools.
pub async fn aggregate(
    source: &dyn TopicSource,
    nodes: &[NodeConfig],
    opts: &AggregateOptions,
    now: DateTime<Utc>,
) -> DigestResult {
    ensure_metrics_described();

    let hot = fetch_hot(source, opts, now).await;
    tracing::info!(target: "ingest", hot = hot.len(), "hot pool fetched");

    // `buffered` yields in input order regardless of completion order.
    let candidates: Vec<NodeCandidates> = stream::iter(nodes.iter().cloned())
        .map(|node| fetch_node(source, node, opts, now))
        .buffered(opts.fetch_concurrency.max(1))
        .collect()
        .await;

    let digest = fold_pools(hot, candidates, opts);

    counter!("digest_topics_kept_total").increment(digest.total() as u64);
    gauge!("digest_last_run_ts").set(now.timestamp() as f64);
    tracing::info!(
        target: "ingest",
        pools = digest.pools.len(),
        total = digest.total(),
        "aggregation finished"
    );
    digest
}
