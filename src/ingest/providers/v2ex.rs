// src/ingest/providers/v2ex.rs
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde_json::Value;

use crate::ingest::types::{RawReply, RawTopic, SourceError, TopicSource};

pub const DEFAULT_USER_AGENT: &str = "V2EX-Daily-Digest/1.0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// V2EX public JSON API. Hot list, per-node topics, per-topic replies.
pub struct V2exProvider {
    mode: Mode,
}

enum Mode {
    Http {
        api_base: String,
        client: reqwest::Client,
    },
    /// Pre-loaded pages keyed by "hot", "node:<name>", "replies:<id>".
    Fixture(HashMap<String, Vec<Value>>),
}

impl V2exProvider {
    pub fn from_url(api_base: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("building v2ex http client")?;
        Ok(Self {
            mode: Mode::Http {
                api_base: api_base.trim_end_matches('/').to_string(),
                client,
            },
        })
    }

    pub fn from_pages(pages: HashMap<String, Vec<Value>>) -> Self {
        Self {
            mode: Mode::Fixture(pages),
        }
    }

    /// Offline mode: `hot.json`, `node_<name>.json`, `replies_<id>.json` in `dir`.
    /// Files that do not parse as a JSON array are skipped.
    pub fn from_fixture_dir(dir: &Path) -> Result<Self> {
        let mut pages = HashMap::new();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("reading fixture dir {}", dir.display()))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let key = if stem == "hot" {
                "hot".to_string()
            } else if let Some(node) = stem.strip_prefix("node_") {
                format!("node:{node}")
            } else if let Some(id) = stem.strip_prefix("replies_") {
                format!("replies:{id}")
            } else {
                continue;
            };
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading fixture {}", path.display()))?;
            match parse_array(&content) {
                Some(records) => {
                    pages.insert(key, records);
                }
                None => tracing::warn!(target: "ingest", path = %path.display(), "fixture is not a JSON array"),
            }
        }
        Ok(Self::from_pages(pages))
    }

    /// `query` values are percent-encoded by reqwest, so node names with
    /// `&`, `#` or spaces reach the API intact.
    async fn get_array(
        &self,
        key: String,
        api_path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<Value>, SourceError> {
        match &self.mode {
            Mode::Fixture(pages) => Ok(pages.get(&key).cloned().unwrap_or_default()),
            Mode::Http { api_base, client } => {
                let url = format!("{api_base}{api_path}");
                let t0 = std::time::Instant::now();
                let resp = client
                    .get(&url)
                    .query(query)
                    .send()
                    .await
                    .map_err(map_reqwest)?;

                let status = resp.status();
                if !status.is_success() {
                    tracing::warn!(target: "ingest", %url, %status, "non-2xx from v2ex api");
                    counter!("digest_fetch_errors_total", "source" => key).increment(1);
                    return Ok(Vec::new());
                }

                let body = match resp.text().await {
                    Ok(b) => b,
                    Err(e) if e.is_timeout() => return Err(SourceError::Timeout),
                    Err(e) => {
                        tracing::warn!(target: "ingest", %url, error = %e, "unreadable v2ex body");
                        return Ok(Vec::new());
                    }
                };
                histogram!("digest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

                match parse_array(&body) {
                    Some(records) => Ok(records),
                    None => {
                        tracing::warn!(target: "ingest", %url, "v2ex body is not a JSON array");
                        counter!("digest_fetch_errors_total", "source" => key).increment(1);
                        Ok(Vec::new())
                    }
                }
            }
        }
    }
}

fn parse_array(body: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(body).ok()? {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

fn map_reqwest(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Network(e.to_string())
    }
}

#[async_trait]
impl TopicSource for V2exProvider {
    async fn fetch_topics(
        &self,
        node: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RawTopic>, SourceError> {
        let mut records = match node {
            None => self.get_array("hot".to_string(), "/api/topics/hot.json", &[]).await?,
            Some(n) => {
                self.get_array(
                    format!("node:{n}"),
                    "/api/topics/show.json",
                    &[("node_name", n.to_string())],
                )
                .await?
            }
        };
        records.truncate(limit);
        counter!("digest_topics_fetched_total").increment(records.len() as u64);
        Ok(records)
    }

    async fn fetch_replies(
        &self,
        topic_id: u64,
        limit: usize,
    ) -> Result<Vec<RawReply>, SourceError> {
        let mut records = self
            .get_array(
                format!("replies:{topic_id}"),
                "/api/replies/show.json",
                &[("topic_id", topic_id.to_string())],
            )
            .await?;
        records.truncate(limit);
        Ok(records)
    }

    fn name(&self) -> &str {
        "v2ex"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn fixture_pages_are_truncated_to_limit() {
        let mut pages = HashMap::new();
        pages.insert(
            "node:x".to_string(),
            (1..=5).map(|i| json!({ "id": i })).collect(),
        );
        let p = V2exProvider::from_pages(pages);
        let out = p.fetch_topics(Some("x"), 3).await.unwrap();
        assert_eq!(out.len(), 3);
        assert!(p.fetch_topics(None, 20).await.unwrap().is_empty());
    }

    #[test]
    fn parse_array_rejects_objects() {
        assert!(parse_array(r#"{"message":"rate limited"}"#).is_none());
        assert_eq!(parse_array("[1,2]").map(|v| v.len()), Some(2));
        assert!(parse_array("<html>").is_none());
    }
}
