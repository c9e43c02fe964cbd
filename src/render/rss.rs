//! RSS 2.0 feed via quick-xml's event writer.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::ingest::types::{DigestResult, Topic};
use crate::render::DigestMeta;

pub const DEFAULT_MAX_ITEMS: usize = 30;
const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

fn write_text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(&strip_control(text))))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Drop characters XML 1.0 cannot carry (C0 controls other than tab/LF/CR).
fn strip_control(input: &str) -> String {
    input
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || c >= ' ')
        .collect()
}

fn item_description(topic: &Topic) -> String {
    if topic.summary.is_empty() {
        format!("作者: {} | 回复数: {}", topic.author, topic.reply_count)
    } else {
        topic.summary.clone()
    }
}

/// Build the feed document. Items follow pool order, capped at `max_items`.
pub fn render_rss(digest: &DigestResult, meta: &DigestMeta, max_items: usize) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss_start = BytesStart::new("rss");
    rss_start.push_attribute(("version", "2.0"));
    rss_start.push_attribute(("xmlns:atom", ATOM_NS));
    writer.write_event(Event::Start(rss_start))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    write_text_element(&mut writer, "title", "V2EX 每日汇总")?;
    write_text_element(&mut writer, "link", &meta.site_url)?;
    write_text_element(
        &mut writer,
        "description",
        "V2EX 精选帖子每日摘要 - 自动抓取热门内容，AI 智能总结",
    )?;
    write_text_element(&mut writer, "language", "zh-cn")?;
    write_text_element(&mut writer, "lastBuildDate", &meta.generated_at.to_rfc2822())?;
    write_text_element(&mut writer, "generator", "V2EX Daily Digest RSS Generator")?;
    if !meta.feed_self_link.is_empty() {
        let mut atom = BytesStart::new("atom:link");
        atom.push_attribute(("href", meta.feed_self_link.as_str()));
        atom.push_attribute(("rel", "self"));
        atom.push_attribute(("type", "application/rss+xml"));
        writer.write_event(Event::Empty(atom))?;
    }

    let items = digest
        .pools
        .iter()
        .flat_map(|p| p.topics.iter().map(move |t| (p, t)))
        .take(max_items);
    for (pool, topic) in items {
        writer.write_event(Event::Start(BytesStart::new("item")))?;
        write_text_element(
            &mut writer,
            "title",
            &format!("[{}] {}", pool.config.display_label(), topic.title),
        )?;
        write_text_element(&mut writer, "link", &topic.url)?;
        write_text_element(&mut writer, "description", &item_description(topic))?;

        let mut guid = BytesStart::new("guid");
        guid.push_attribute(("isPermaLink", "true"));
        writer.write_event(Event::Start(guid))?;
        writer.write_event(Event::Text(BytesText::new(&topic.url)))?;
        writer.write_event(Event::End(BytesEnd::new("guid")))?;

        write_text_element(&mut writer, "pubDate", &topic.created_at.to_rfc2822())?;
        write_text_element(&mut writer, "author", &topic.author)?;
        writer.write_event(Event::End(BytesEnd::new("item")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    let mut out = String::from_utf8(writer.into_inner()).context("rss output is not utf-8")?;
    out.push('\n');
    Ok(out)
}

/// Render and write to `path`, creating parent directories.
pub fn write_rss(digest: &DigestResult, meta: &DigestMeta, max_items: usize, path: &Path) -> Result<usize> {
    let xml = render_rss(digest, meta, max_items)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating rss output dir {}", parent.display()))?;
    }
    std::fs::write(path, xml).with_context(|| format!("writing rss feed to {}", path.display()))?;
    let count = digest.total().min(max_items);
    tracing::info!(target: "notify", path = %path.display(), items = count, "rss feed written");
    Ok(count)
}
