//! Best-effort parsing of free-form model output.
//!
//! Batch grammar, one entry per line:
//!   `[-*•]? 【?ID】? (:|：) SUMMARY`
//! Detailed grammar, markers alone on their line:
//!   `[SUMMARY]`, `[DISCUSSION]`, `[HIGHLIGHTS]`; highlight lines are
//!   `- author: text`.
//! Anything that does not match yields no data, never an error.

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::ingest::types::FeaturedComment;

pub const MAX_FEATURED: usize = 3;

/// `id:summary` lines → map. Later duplicates overwrite earlier ones.
pub fn parse_batch_summaries(text: &str) -> HashMap<u64, String> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*•]\s*)?【?(\d+)】?\s*[:：]\s*(.+?)\s*$").expect("static batch regex")
    });

    let mut out = HashMap::new();
    for line in text.lines() {
        let Some(caps) = re.captures(line) else {
            continue;
        };
        let Ok(id) = caps[1].parse::<u64>() else {
            continue;
        };
        let summary = caps[2].trim();
        if !summary.is_empty() {
            out.insert(id, summary.to_string());
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailedSummary {
    pub summary: String,
    pub comments_summary: String,
    pub featured_comments: Vec<FeaturedComment>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Summary,
    Discussion,
    Highlights,
}

fn marker(line: &str) -> Option<Section> {
    match line.trim().to_ascii_uppercase().as_str() {
        "[SUMMARY]" => Some(Section::Summary),
        "[DISCUSSION]" => Some(Section::Discussion),
        "[HIGHLIGHTS]" => Some(Section::Highlights),
        _ => None,
    }
}

fn parse_highlight(line: &str) -> Option<FeaturedComment> {
    let body = line.trim().trim_start_matches(['-', '*', '•']).trim();
    let body = body.strip_prefix('@').unwrap_or(body);
    let (author, text) = body
        .split_once(':')
        .or_else(|| body.split_once('：'))?;
    let (author, text) = (author.trim(), text.trim());
    if author.is_empty() || text.is_empty() || author.contains(char::is_whitespace) {
        return None;
    }
    Some(FeaturedComment {
        author: author.to_string(),
        text: text.to_string(),
    })
}

pub fn parse_detailed(text: &str) -> DetailedSummary {
    let mut section = Section::None;
    let mut summary = Vec::new();
    let mut discussion = Vec::new();
    let mut out = DetailedSummary::default();

    for line in text.lines() {
        if let Some(s) = marker(line) {
            section = s;
            continue;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match section {
            Section::None => {}
            Section::Summary => summary.push(trimmed),
            Section::Discussion => discussion.push(trimmed),
            Section::Highlights => {
                if out.featured_comments.len() < MAX_FEATURED {
                    if let Some(c) = parse_highlight(trimmed) {
                        out.featured_comments.push(c);
                    }
                }
            }
        }
    }

    out.summary = summary.join(" ");
    out.comments_summary = discussion.join(" ");
    out
}
