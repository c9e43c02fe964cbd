// src/ingest/normalize.rs
//! Raw upstream record → canonical `Topic`. Total over any JSON shape:
//! every field read carries its own default.

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::ingest::types::{RawReply, RawTopic, Reply, Topic};

pub const UNTITLED: &str = "(untitled)";
pub const UNKNOWN_AUTHOR: &str = "unknown";

const TITLE_MAX_CHARS: usize = 300;
const REPLY_MAX_CHARS: usize = 500;

/// Collapse whitespace and cap length. Everything else is kept verbatim:
/// titles are plain text, so `<div>` in a title is content, not markup.
pub fn clean_title(s: &str, max_chars: usize) -> String {
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("static ws regex"));
    let mut out = re_ws.replace_all(s, " ").trim().to_string();

    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
    }
    out
}

/// Reply bodies are HTML: decode entities, strip tags, then `clean_title`.
pub fn normalize_text(s: &str, max_chars: usize) -> String {
    let decoded = html_escape::decode_html_entities(s);

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| {
        regex::Regex::new(r"(?is)</?[a-z][^>]*>").expect("static tag regex")
    });
    let stripped = re_tags.replace_all(&decoded, " ");

    clean_title(&stripped, max_chars)
}

/// Topic id as the dedup key. Absent, negative or non-integer ids yield `None`.
pub fn topic_id(raw: &RawTopic) -> Option<u64> {
    match raw.get("id")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn str_field<'a>(raw: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut cur = raw;
    for key in path {
        cur = cur.get(key)?;
    }
    cur.as_str()
}

fn epoch_field(raw: &Value, key: &str) -> DateTime<Utc> {
    let secs = raw.get(key).and_then(Value::as_i64).unwrap_or(0);
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

pub fn topic_url(base_url: &str, id: u64) -> String {
    format!("{}/t/{id}", base_url.trim_end_matches('/'))
}

/// Map one raw record. `None` only when the id is missing: the id is the
/// dedup key and cannot be defaulted.
pub fn normalize(raw: &RawTopic, fallback_node: &str, base_url: &str) -> Option<Topic> {
    let id = topic_id(raw)?;

    let title = str_field(raw, &["title"])
        .map(|t| clean_title(t, TITLE_MAX_CHARS))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let author = str_field(raw, &["member", "username"])
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(UNKNOWN_AUTHOR)
        .to_string();

    let reply_count = raw
        .get("replies")
        .and_then(Value::as_u64)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(0);

    let source_node = str_field(raw, &["node", "name"])
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(fallback_node)
        .to_string();

    Some(Topic {
        id,
        title,
        url: topic_url(base_url, id),
        author,
        reply_count,
        created_at: epoch_field(raw, "created"),
        source_node,
        summary: String::new(),
        comments_summary: String::new(),
        featured_comments: Vec::new(),
    })
}

/// Normalize a whole page, skipping (and counting) records without an id.
pub fn normalize_all(records: &[RawTopic], fallback_node: &str, base_url: &str) -> Vec<Topic> {
    let mut out = Vec::with_capacity(records.len());
    for raw in records {
        match normalize(raw, fallback_node, base_url) {
            Some(t) => out.push(t),
            None => {
                tracing::debug!(target: "ingest", node = fallback_node, "record without id skipped");
                counter!("digest_invalid_records_total").increment(1);
            }
        }
    }
    out
}

/// Strictly inside the rolling window: a topic exactly at the boundary is excluded.
/// A window reaching past the earliest representable time keeps everything.
pub fn is_recent(topic: &Topic, now: DateTime<Utc>, window: Duration) -> bool {
    now.checked_sub_signed(window)
        .map_or(true, |cutoff| topic.created_at > cutoff)
}

pub fn normalize_reply(raw: &RawReply) -> Option<Reply> {
    let content = str_field(raw, &["content"])
        .map(|c| normalize_text(c, REPLY_MAX_CHARS))
        .filter(|c| !c.is_empty())?;
    let author = str_field(raw, &["member", "username"])
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(UNKNOWN_AUTHOR)
        .to_string();
    Some(Reply { author, content })
}
