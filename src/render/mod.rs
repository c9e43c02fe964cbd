// src/render/mod.rs
//! Presentation of a finished `DigestResult`: HTML email body and RSS feed.

pub mod html;
pub mod rss;

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Run-level facts the renderers need besides the topics.
#[derive(Debug, Clone)]
pub struct DigestMeta {
    pub generated_at: DateTime<Utc>,
    /// Display timezone for dates shown to readers.
    pub offset: FixedOffset,
    pub site_url: String,
    pub feed_self_link: String,
}

impl DigestMeta {
    pub fn new(generated_at: DateTime<Utc>, offset_hours: i32, site_url: &str) -> Self {
        let offset = FixedOffset::east_opt(offset_hours.saturating_mul(3600)).unwrap_or_else(|| Utc.fix());
        Self {
            generated_at,
            offset,
            site_url: site_url.trim_end_matches('/').to_string(),
            feed_self_link: String::new(),
        }
    }

    pub fn with_self_link(mut self, link: &str) -> Self {
        self.feed_self_link = link.to_string();
        self
    }

    pub fn local(&self, ts: DateTime<Utc>) -> DateTime<FixedOffset> {
        ts.with_timezone(&self.offset)
    }
}

/// `📰 V2EX 每日精选 (10/18) - 12篇新帖`
pub fn email_subject(meta: &DigestMeta, total: usize) -> String {
    format!(
        "📰 V2EX 每日精选 ({}) - {}篇新帖",
        meta.local(meta.generated_at).format("%m/%d"),
        total
    )
}
