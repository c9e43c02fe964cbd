// src/enrich/mod.rs
//! Optional AI summaries. Fills topic fields in place, never drops a topic
//! and never returns an error: anything that fails leaves fields empty.

pub mod ai_adapter;
pub mod parse;

use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ai::AiConfig;
use crate::enrich::ai_adapter::{build_client_from_config, DynAiClient};
use crate::enrich::parse::{parse_batch_summaries, parse_detailed};
use crate::ingest::normalize::normalize_reply;
use crate::ingest::types::{DigestResult, Topic, TopicSource};

pub const REPLIES_PER_TOPIC: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnrichMode {
    /// One short summary per topic, batched.
    #[default]
    Brief,
    /// Per topic: summary, discussion summary and highlighted replies.
    Detailed,
}

impl FromStr for EnrichMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brief" => Ok(EnrichMode::Brief),
            "detailed" => Ok(EnrichMode::Detailed),
            other => Err(format!("unknown enrich mode '{other}' (expected brief|detailed)")),
        }
    }
}

pub struct Enricher {
    client: DynAiClient,
    /// Reply source for detailed mode. Without one, detailed mode only sees titles.
    replies: Option<Arc<dyn TopicSource>>,
    batch_size: usize,
    delay: Duration,
}

impl Enricher {
    pub fn new(client: DynAiClient, batch_size: usize, delay: Duration) -> Self {
        Self {
            client,
            replies: None,
            batch_size: batch_size.max(1),
            delay,
        }
    }

    pub fn from_config(cfg: &AiConfig) -> Self {
        Self::new(
            build_client_from_config(cfg),
            cfg.batch_size,
            Duration::from_millis(cfg.batch_delay_ms),
        )
    }

    pub fn with_replies(mut self, source: Arc<dyn TopicSource>) -> Self {
        self.replies = Some(source);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.client.provider_name() != "disabled"
    }

    pub async fn enrich_digest(&self, digest: &mut DigestResult, mode: EnrichMode) {
        for pool in &mut digest.pools {
            if pool.topics.is_empty() {
                continue;
            }
            tracing::info!(target: "enrich", pool = %pool.key, topics = pool.topics.len(), "enriching pool");
            self.enrich(&mut pool.topics, mode).await;
        }
    }

    pub async fn enrich(&self, topics: &mut [Topic], mode: EnrichMode) {
        if topics.is_empty() || !self.is_enabled() {
            return;
        }
        match mode {
            EnrichMode::Brief => self.enrich_brief(topics).await,
            EnrichMode::Detailed => self.enrich_detailed(topics).await,
        }
        let done = topics.iter().filter(|t| !t.summary.is_empty()).count();
        tracing::info!(target: "enrich", summarized = done, total = topics.len(), "enrichment finished");
    }

    async fn enrich_brief(&self, topics: &mut [Topic]) {
        let total_batches = topics.len().div_ceil(self.batch_size);
        for (i, batch) in topics.chunks_mut(self.batch_size).enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let prompt = brief_prompt(batch);
            let summaries = match self.client.complete(&prompt).await {
                Some(text) => parse_batch_summaries(&text),
                None => Default::default(),
            };
            let mut hits = 0usize;
            for t in batch.iter_mut() {
                if let Some(s) = summaries.get(&t.id) {
                    t.summary = s.clone();
                    hits += 1;
                }
            }
            tracing::debug!(target: "enrich", batch = i + 1, total_batches, hits, size = batch.len(), "batch done");
        }
    }

    async fn enrich_detailed(&self, topics: &mut [Topic]) {
        for (i, topic) in topics.iter_mut().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let replies = self.fetch_reply_lines(topic.id).await;
            let prompt = detailed_prompt(topic, &replies);
            let Some(text) = self.client.complete(&prompt).await else {
                continue;
            };
            let parsed = parse_detailed(&text);
            topic.summary = parsed.summary;
            topic.comments_summary = parsed.comments_summary;
            topic.featured_comments = parsed.featured_comments;
        }
    }

    async fn fetch_reply_lines(&self, topic_id: u64) -> Vec<String> {
        let Some(source) = &self.replies else {
            return Vec::new();
        };
        match source.fetch_replies(topic_id, REPLIES_PER_TOPIC).await {
            Ok(raw) => raw
                .iter()
                .filter_map(normalize_reply)
                .map(|r| format!("{}: {}", r.author, r.content))
                .collect(),
            Err(e) => {
                tracing::warn!(target: "enrich", topic_id, error = %e, "reply fetch failed");
                Vec::new()
            }
        }
    }
}

pub fn brief_prompt(batch: &[Topic]) -> String {
    let mut list = String::new();
    for t in batch {
        let _ = write!(list, "\n- 【{}】{}", t.id, t.title);
    }
    format!(
        "请为以下V2EX帖子各生成一句简短的中文摘要（15-40字），提取核心要点。\n\n\
         格式要求：每行一个，格式为 \"ID:摘要\"，例如：\n\
         123456:这是一个关于xxx的分享\n\
         789012:作者开发了一个yyy工具\n\n\
         帖子列表：{list}\n\n\
         请严格按格式输出，每个ID一行，不要有其他内容："
    )
}

pub fn detailed_prompt(topic: &Topic, replies: &[String]) -> String {
    let mut comments = String::new();
    for r in replies {
        let _ = write!(comments, "\n- {r}");
    }
    if comments.is_empty() {
        comments.push_str("\n（暂无回复）");
    }
    format!(
        "请阅读以下V2EX帖子及其回复，用中文输出三个部分，每个标记单独一行：\n\
         [SUMMARY]\n一句话概括帖子内容（15-40字）\n\
         [DISCUSSION]\n一句话概括讨论的主要观点\n\
         [HIGHLIGHTS]\n最多3条精选回复，每行格式为 \"- 用户名: 回复内容\"\n\n\
         标题：{}\n回复：{comments}",
        topic.title
    )
}
