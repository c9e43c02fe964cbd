// tests/metrics_textfile.rs
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use forum_digest::ingest::providers::V2exProvider;
use forum_digest::ingest::{aggregate, AggregateOptions};
use forum_digest::metrics::Metrics;
use forum_digest::NodeConfig;
use serde_json::json;

// Single test: the recorder is process-global.
#[tokio::test]
async fn aggregation_counters_land_in_textfile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prom").join("digest.prom");
    let metrics = Metrics::init(&path).unwrap();

    let now: DateTime<Utc> = DateTime::from_timestamp(1_792_267_200, 0).unwrap();
    let mut pages = HashMap::new();
    pages.insert("hot".to_string(), vec![json!({"id": 1})]);
    pages.insert(
        "node:x".to_string(),
        vec![json!({"id": 1, "created": now.timestamp()}), json!({"title": "no id"})],
    );
    let src = V2exProvider::from_pages(pages);

    let digest = aggregate(&src, &[NodeConfig::new("x", "", "📌")], &AggregateOptions::default(), now).await;
    assert_eq!(digest.total(), 1);

    metrics.write_textfile().unwrap();
    let body = std::fs::read_to_string(&path).unwrap();
    assert!(body.contains("digest_topics_kept_total 1"));
    assert!(body.contains("digest_dedup_total 1"));
    assert!(body.contains("digest_invalid_records_total 1"));
    assert!(body.contains("digest_last_run_ts"));
}
