// tests/ingest_aggregate.rs
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use forum_digest::ingest::types::{NodeConfig, RawReply, RawTopic, SourceError, TopicSource};
use forum_digest::ingest::{aggregate, AggregateOptions};
use serde_json::{json, Value};

/// In-memory source. Nodes listed in `failing` return a transport error.
#[derive(Default)]
struct MockSource {
    hot: Vec<Value>,
    nodes: HashMap<String, Vec<Value>>,
    failing: HashSet<String>,
}

#[async_trait]
impl TopicSource for MockSource {
    async fn fetch_topics(&self, node: Option<&str>, limit: usize) -> Result<Vec<RawTopic>, SourceError> {
        let mut v = match node {
            None => self.hot.clone(),
            Some(n) if self.failing.contains(n) => {
                return Err(SourceError::Network("connection reset".into()))
            }
            Some(n) => self.nodes.get(n).cloned().unwrap_or_default(),
        };
        v.truncate(limit);
        Ok(v)
    }

    async fn fetch_replies(&self, _topic_id: u64, _limit: usize) -> Result<Vec<RawReply>, SourceError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_792_267_200, 0).unwrap()
}

fn raw(id: u64, replies: u64, age_hours: i64) -> Value {
    json!({
        "id": id,
        "title": format!("topic {id}"),
        "replies": replies,
        "created": (now() - Duration::hours(age_hours)).timestamp(),
        "member": { "username": "u" },
    })
}

fn ids(topics: &[forum_digest::Topic]) -> Vec<u64> {
    topics.iter().map(|t| t.id).collect()
}

fn node(name: &str) -> NodeConfig {
    NodeConfig::new(name, "", "📌")
}

#[tokio::test]
async fn hot_duplicates_are_removed_from_nodes() {
    let mut src = MockSource {
        hot: vec![raw(1, 0, 1), raw(2, 0, 1), raw(3, 0, 1)],
        ..Default::default()
    };
    src.nodes.insert("x".into(), vec![raw(2, 9, 1), raw(4, 1, 1), raw(5, 7, 1)]);

    let digest = aggregate(&src, &[node("x")], &AggregateOptions::default(), now()).await;

    assert_eq!(digest.keys(), vec!["_hot", "x"]);
    assert_eq!(ids(&digest.pool("_hot").unwrap().topics), vec![1, 2, 3]);
    assert_eq!(ids(&digest.pool("x").unwrap().topics), vec![4, 5]);
}

#[tokio::test]
async fn popularity_ranking_caps_at_ten_with_stable_ties() {
    // Reply counts: 0..14 with a tie on 14 between ids 114 and 115.
    let mut page: Vec<Value> = (0..13).map(|i| raw(100 + i, i, 1)).collect();
    page.push(raw(114, 14, 1));
    page.push(raw(115, 14, 1));
    let mut src = MockSource::default();
    src.nodes.insert("y".into(), page);

    let opts = AggregateOptions {
        rank_by_popularity: true,
        ..Default::default()
    };
    let digest = aggregate(&src, &[node("y")], &opts, now()).await;
    let pool = &digest.pool("y").unwrap().topics;

    assert_eq!(pool.len(), 10);
    assert_eq!(ids(&pool[..3]), vec![114, 115, 112]);
    assert!(pool.windows(2).all(|w| w[0].reply_count >= w[1].reply_count));
}

#[tokio::test]
async fn failing_node_yields_empty_pool_only() {
    let mut src = MockSource {
        hot: vec![raw(1, 0, 1)],
        ..Default::default()
    };
    src.nodes.insert("ok".into(), vec![raw(10, 0, 1)]);
    src.failing.insert("down".into());

    let nodes = [node("down"), node("ok")];
    let digest = aggregate(&src, &nodes, &AggregateOptions::default(), now()).await;

    assert_eq!(digest.keys(), vec!["_hot", "down", "ok"]);
    assert!(digest.pool("down").unwrap().topics.is_empty());
    assert_eq!(ids(&digest.pool("ok").unwrap().topics), vec![10]);
    assert_eq!(digest.total(), 2);
}

#[tokio::test]
async fn everything_empty_gives_zero_total() {
    let src = MockSource::default();
    let nodes = [node("a"), node("b")];
    let digest = aggregate(&src, &nodes, &AggregateOptions::default(), now()).await;
    assert_eq!(digest.total(), 0);
    assert_eq!(digest.pools.len(), 3);
}

#[tokio::test]
async fn node_pools_drop_stale_topics_but_hot_keeps_them() {
    let mut src = MockSource {
        hot: vec![raw(1, 0, 100)],
        ..Default::default()
    };
    src.nodes.insert("x".into(), vec![raw(2, 0, 49), raw(3, 0, 47), raw(4, 0, 48)]);

    let digest = aggregate(&src, &[node("x")], &AggregateOptions::default(), now()).await;
    assert_eq!(ids(&digest.pool("_hot").unwrap().topics), vec![1]);
    // Exactly 48h old sits on the boundary and is excluded.
    assert_eq!(ids(&digest.pool("x").unwrap().topics), vec![3]);

    let strict = AggregateOptions {
        filter_hot_by_recency: true,
        ..Default::default()
    };
    let digest = aggregate(&src, &[node("x")], &strict, now()).await;
    assert!(digest.pool("_hot").unwrap().topics.is_empty());
}

#[tokio::test]
async fn ids_are_unique_across_pools_and_order_follows_config() {
    let mut src = MockSource::default();
    src.nodes.insert("b".into(), vec![raw(1, 0, 1), raw(2, 0, 1)]);
    src.nodes.insert("a".into(), vec![raw(2, 0, 1), raw(3, 0, 1), raw(3, 0, 1)]);

    // Concurrency must not change which pool claims a shared id.
    for concurrency in [1, 8] {
        let opts = AggregateOptions {
            fetch_concurrency: concurrency,
            ..Default::default()
        };
        let digest = aggregate(&src, &[node("b"), node("a")], &opts, now()).await;
        assert_eq!(digest.keys(), vec!["_hot", "b", "a"]);
        assert_eq!(ids(&digest.pool("b").unwrap().topics), vec![1, 2]);
        assert_eq!(ids(&digest.pool("a").unwrap().topics), vec![3]);

        let mut seen = HashSet::new();
        assert!(digest.topics().all(|t| seen.insert(t.id)));
    }
}

#[tokio::test]
async fn dedup_can_be_switched_off_across_pools() {
    let mut src = MockSource {
        hot: vec![raw(1, 0, 1)],
        ..Default::default()
    };
    src.nodes.insert("x".into(), vec![raw(1, 0, 1), raw(1, 0, 1)]);

    let opts = AggregateOptions {
        with_dedup: false,
        ..Default::default()
    };
    let digest = aggregate(&src, &[node("x")], &opts, now()).await;
    // Cross-pool repeats survive; in-pool repeats never do.
    assert_eq!(ids(&digest.pool("x").unwrap().topics), vec![1]);
    assert_eq!(digest.total(), 2);
}

#[tokio::test]
async fn records_without_id_are_skipped() {
    let mut src = MockSource::default();
    src.nodes.insert(
        "x".into(),
        vec![json!({"title": "no id", "created": now().timestamp()}), raw(7, 0, 1)],
    );
    let digest = aggregate(&src, &[node("x")], &AggregateOptions::default(), now()).await;
    assert_eq!(ids(&digest.pool("x").unwrap().topics), vec![7]);
    assert_eq!(digest.pool("x").unwrap().topics[0].source_node, "x");
}
