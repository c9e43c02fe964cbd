// tests/ingest_fixtures.rs
use std::path::PathBuf;

use chrono::DateTime;
use forum_digest::ingest::normalize::{normalize_reply, UNKNOWN_AUTHOR, UNTITLED};
use forum_digest::ingest::providers::V2exProvider;
use forum_digest::ingest::types::TopicSource;
use forum_digest::ingest::{aggregate, AggregateOptions};
use forum_digest::NodeConfig;

fn fixtures() -> V2exProvider {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures");
    V2exProvider::from_fixture_dir(&dir).unwrap()
}

fn nodes() -> Vec<NodeConfig> {
    vec![
        NodeConfig::new("create", "分享创造", "🎨"),
        NodeConfig::new("programmer", "程序员", "👨‍💻"),
        NodeConfig::new("ideas", "奇思妙想", "💡"),
    ]
}

fn pool_ids(digest: &forum_digest::DigestResult, key: &str) -> Vec<u64> {
    digest.pool(key).unwrap().topics.iter().map(|t| t.id).collect()
}

#[tokio::test]
async fn saved_pages_aggregate_end_to_end() {
    let now = DateTime::from_timestamp(1_792_267_200, 0).unwrap();
    let digest = aggregate(&fixtures(), &nodes(), &AggregateOptions::default(), now).await;

    assert_eq!(digest.keys(), vec!["_hot", "create", "programmer", "ideas"]);
    assert_eq!(pool_ids(&digest, "_hot"), vec![1001, 1002]);
    // 1002 already in hot, 2002 is older than the window.
    assert_eq!(pool_ids(&digest, "create"), vec![2001]);
    assert_eq!(pool_ids(&digest, "programmer"), vec![3001, 3002]);
    assert!(pool_ids(&digest, "ideas").is_empty());
    assert_eq!(digest.total(), 5);

    let hot = &digest.pool("_hot").unwrap().topics;
    assert_eq!(hot[1].title, "做了一个记账小程序 & 开源了");
    assert_eq!(hot[0].source_node, "programmer");

    let create = &digest.pool("create").unwrap().topics[0];
    assert_eq!(create.title, "周末写了个 RSS 阅读器，支持 <feed> 标签");

    let sparse = &digest.pool("programmer").unwrap().topics[1];
    assert_eq!(sparse.title, UNTITLED);
    assert_eq!(sparse.author, UNKNOWN_AUTHOR);
    assert_eq!(sparse.source_node, "programmer");
}

#[tokio::test]
async fn popularity_ranking_reorders_node_pools() {
    let now = DateTime::from_timestamp(1_792_267_200, 0).unwrap();
    let opts = AggregateOptions {
        rank_by_popularity: true,
        ..Default::default()
    };
    let digest = aggregate(&fixtures(), &nodes(), &opts, now).await;
    assert_eq!(pool_ids(&digest, "programmer"), vec![3002, 3001]);
    // Hot keeps upstream order.
    assert_eq!(pool_ids(&digest, "_hot"), vec![1001, 1002]);
}

#[tokio::test]
async fn saved_replies_normalize_and_skip_blank_ones() {
    let raw = fixtures().fetch_replies(2001, 20).await.unwrap();
    let replies: Vec<_> = raw.iter().filter_map(normalize_reply).collect();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[1].author, "fan2");
    assert_eq!(replies[1].content, "能导入 OPML 吗？");
}
