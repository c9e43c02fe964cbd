//! HTML email body, rendered with maud.

use maud::{html, Markup, PreEscaped, Render, DOCTYPE};

use crate::ingest::types::{DigestPool, DigestResult, Topic};
use crate::render::DigestMeta;

const STYLE: &str = r#"
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; max-width: 700px; margin: 0 auto; padding: 20px; background-color: #f5f5f5; }
.container { background: white; border-radius: 12px; padding: 30px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
h1 { color: #1a1a2e; border-bottom: 3px solid #4a90d9; padding-bottom: 15px; margin-bottom: 30px; }
h2 { color: #4a90d9; margin-top: 30px; margin-bottom: 15px; padding: 10px 15px; background: #f0f7ff; border-radius: 8px; }
.topic { padding: 12px 0; border-bottom: 1px solid #eee; }
.topic:last-child { border-bottom: none; }
.topic-title { font-size: 15px; margin-bottom: 5px; }
.topic-title a { color: #1a1a2e; text-decoration: none; }
.topic-meta { font-size: 12px; color: #888; }
.summary { font-size: 13px; color: #555; margin-top: 6px; }
.discussion { font-size: 12px; color: #666; margin-top: 4px; }
.featured { font-size: 12px; color: #666; margin: 4px 0 0 0; padding-left: 18px; }
.replies { background: #e8f4e8; color: #2d862d; padding: 2px 8px; border-radius: 10px; font-size: 11px; }
.empty { color: #999; font-style: italic; padding: 20px; text-align: center; }
.footer { margin-top: 30px; padding-top: 20px; border-top: 1px solid #eee; text-align: center; color: #888; font-size: 12px; }
"#;

/// One topic row.
struct TopicRow<'a> {
    topic: &'a Topic,
    meta: &'a DigestMeta,
}

impl Render for TopicRow<'_> {
    fn render(&self) -> Markup {
        let t = self.topic;
        let created = self.meta.local(t.created_at).format("%Y-%m-%d %H:%M");
        html! {
            div.topic {
                div.topic-title {
                    a href=(t.url) target="_blank" { (t.title) }
                }
                div.topic-meta {
                    "👤 " (t.author) " · 🕐 " (created)
                    @if t.reply_count > 0 {
                        " " span.replies { (t.reply_count) " 回复" }
                    }
                }
                @if !t.summary.is_empty() {
                    div.summary { "💡 " (t.summary) }
                }
                @if !t.comments_summary.is_empty() {
                    div.discussion { "💬 " (t.comments_summary) }
                }
                @if !t.featured_comments.is_empty() {
                    ul.featured {
                        @for c in &t.featured_comments {
                            li { b { (c.author) } ": " (c.text) }
                        }
                    }
                }
            }
        }
    }
}

fn pool_section(pool: &DigestPool, meta: &DigestMeta) -> Markup {
    html! {
        h2 { (pool.config.display_label()) " (" (pool.topics.len()) ")" }
        @if pool.topics.is_empty() {
            div.empty { "今日暂无更新" }
        } @else {
            @for t in &pool.topics {
                (TopicRow { topic: t, meta })
            }
        }
    }
}

pub fn render_digest(digest: &DigestResult, meta: &DigestMeta) -> Markup {
    let today = meta.local(meta.generated_at).format("%Y年%m月%d日").to_string();
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { "V2EX 每日精选 - " (today) }
                style { (PreEscaped(STYLE)) }
            }
            body {
                div.container {
                    h1 { "📰 V2EX 每日精选 - " (today) }
                    @for pool in &digest.pools {
                        (pool_section(pool, meta))
                    }
                    div.footer {
                        "共收录 " (digest.total()) " 篇帖子 · 由 V2EX Daily Digest 自动生成"
                        br;
                        a href=(meta.site_url) style="color: #4a90d9;" { "访问 V2EX" }
                    }
                }
            }
        }
    }
}

pub fn render_html(digest: &DigestResult, meta: &DigestMeta) -> String {
    render_digest(digest, meta).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{DigestPool, NodeConfig, PoolKey};
    use chrono::DateTime;

    #[test]
    fn titles_are_escaped() {
        let topic = Topic {
            id: 1,
            title: "<script>x</script>".into(),
            url: "https://www.v2ex.com/t/1".into(),
            author: "a".into(),
            reply_count: 0,
            created_at: DateTime::UNIX_EPOCH,
            source_node: String::new(),
            summary: String::new(),
            comments_summary: String::new(),
            featured_comments: Vec::new(),
        };
        let digest = DigestResult {
            pools: vec![DigestPool {
                key: PoolKey::Hot,
                config: NodeConfig::hot(),
                topics: vec![topic],
            }],
        };
        let meta = DigestMeta::new(DateTime::UNIX_EPOCH, 8, "https://www.v2ex.com");
        let out = render_html(&digest, &meta);
        assert!(out.contains("&lt;script&gt;"));
        assert!(!out.contains("<script>"));
        assert!(!out.contains("回复</span>"));
    }
}
