// tests/enrich_summaries.rs
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use forum_digest::enrich::ai_adapter::{AiError, DisabledClient, MockProvider, RetryingClient};
use forum_digest::enrich::{EnrichMode, Enricher};
use forum_digest::ingest::providers::V2exProvider;
use forum_digest::Topic;
use serde_json::json;

fn topic(id: u64, title: &str) -> Topic {
    Topic {
        id,
        title: title.into(),
        url: format!("https://www.v2ex.com/t/{id}"),
        author: "u".into(),
        reply_count: 0,
        created_at: DateTime::UNIX_EPOCH,
        source_node: "create".into(),
        summary: String::new(),
        comments_summary: String::new(),
        featured_comments: Vec::new(),
    }
}

fn enricher(mock: Arc<MockProvider>, batch_size: usize) -> Enricher {
    let client = RetryingClient::new(mock, 3, Duration::ZERO);
    Enricher::new(Arc::new(client), batch_size, Duration::ZERO)
}

#[tokio::test]
async fn brief_mode_batches_and_matches_by_id() {
    let mock = Arc::new(MockProvider::new(
        vec![
            Ok("1: 一个命令行工具\n- 【2】：讨论远程办公\nnoise line".into()),
            Ok("3:二手显示器转让".into()),
        ],
        Ok(String::new()),
    ));
    let e = enricher(mock.clone(), 2);
    let mut topics = vec![topic(1, "tool"), topic(2, "remote"), topic(3, "monitor")];

    e.enrich(&mut topics, EnrichMode::Brief).await;

    assert_eq!(topics[0].summary, "一个命令行工具");
    assert_eq!(topics[1].summary, "讨论远程办公");
    assert_eq!(topics[2].summary, "二手显示器转让");
    let prompts = mock.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("【1】tool") && prompts[0].contains("【2】remote"));
    assert!(prompts[1].contains("【3】monitor"));
}

#[tokio::test]
async fn brief_mode_ignores_unknown_ids_and_keeps_gaps_empty() {
    let mock = Arc::new(MockProvider::fixed("99:not ours\n1:ours"));
    let e = enricher(mock, 10);
    let mut topics = vec![topic(1, "a"), topic(2, "b")];

    e.enrich(&mut topics, EnrichMode::Brief).await;

    assert_eq!(topics[0].summary, "ours");
    assert!(topics[1].summary.is_empty());
}

#[tokio::test]
async fn failures_leave_topics_untouched() {
    let mock = Arc::new(MockProvider::new(Vec::new(), Err(AiError::Http(500))));
    let e = enricher(mock.clone(), 10);
    let mut topics = vec![topic(1, "a"), topic(2, "b")];
    let before = topics.clone();

    e.enrich(&mut topics, EnrichMode::Brief).await;
    e.enrich(&mut topics, EnrichMode::Detailed).await;

    assert_eq!(topics, before);
    // One batch call plus one call per topic, each retried three times.
    assert_eq!(mock.prompts().len(), 3 + 2 * 3);
}

#[tokio::test]
async fn rate_limit_is_retried_then_succeeds() {
    let mock = Arc::new(MockProvider::new(
        vec![Err(AiError::RateLimited), Err(AiError::RateLimited)],
        Ok("1:ok".into()),
    ));
    let e = enricher(mock.clone(), 10);
    let mut topics = vec![topic(1, "a")];

    e.enrich(&mut topics, EnrichMode::Brief).await;

    assert_eq!(topics[0].summary, "ok");
    assert_eq!(mock.prompts().len(), 3);
}

#[tokio::test]
async fn detailed_mode_uses_replies_and_fills_all_fields() {
    let answer = "\
[SUMMARY]
作者做了一个浏览器插件
[DISCUSSION]
大家关心隐私问题
[HIGHLIGHTS]
- alice: 很实用
- bob: 开源吗
- carol: 已安装
- dave: 第四条会被丢弃
";
    let mock = Arc::new(MockProvider::fixed(answer));
    let mut pages = HashMap::new();
    pages.insert(
        "replies:1".to_string(),
        vec![json!({"content": "支持一下", "member": {"username": "zed"}})],
    );
    let replies = Arc::new(V2exProvider::from_pages(pages));
    let e = enricher(mock.clone(), 10).with_replies(replies);
    let mut topics = vec![topic(1, "插件")];

    e.enrich(&mut topics, EnrichMode::Detailed).await;

    let t = &topics[0];
    assert_eq!(t.summary, "作者做了一个浏览器插件");
    assert_eq!(t.comments_summary, "大家关心隐私问题");
    assert_eq!(t.featured_comments.len(), 3);
    assert_eq!(t.featured_comments[1].author, "bob");
    assert!(mock.prompts()[0].contains("zed: 支持一下"));
}

#[tokio::test]
async fn disabled_client_is_a_no_op() {
    let e = Enricher::new(Arc::new(DisabledClient), 10, Duration::ZERO);
    assert!(!e.is_enabled());
    let mut topics = vec![topic(1, "a")];
    e.enrich(&mut topics, EnrichMode::Detailed).await;
    assert!(topics[0].summary.is_empty());
}
