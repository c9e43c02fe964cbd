// src/ingest/config.rs
//! Node list loading. Precedence:
//! 1) `$V2EX_NODES` inline JSON array
//! 2) `$DIGEST_CONFIG_PATH`, else `config.json`, else `config/digest.toml`
//! 3) built-in defaults
use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::NodeConfig;

pub const ENV_NODES: &str = "V2EX_NODES";
pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";

pub fn default_nodes() -> Vec<NodeConfig> {
    vec![
        NodeConfig::new("create", "分享创造", "🎨"),
        NodeConfig::new("ideas", "奇思妙想", "💡"),
        NodeConfig::new("programmer", "程序员", "👨‍💻"),
        NodeConfig::new("all4all", "二手交易", "🛒"),
    ]
}

/// Load nodes from a config file. Supports TOML or JSON, either as a bare
/// array or as a table with a `nodes` key.
pub fn load_nodes_from(path: &Path) -> Result<Vec<NodeConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading node config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_nodes(&content, ext.as_str())
}

/// Resolve the node list. Never fails: a broken source is logged and the
/// next one in line is tried.
pub fn load_nodes_default() -> Vec<NodeConfig> {
    if let Ok(inline) = std::env::var(ENV_NODES) {
        if !inline.trim().is_empty() {
            match parse_json(&inline) {
                Ok(v) if !v.is_empty() => return v,
                Ok(_) => tracing::warn!("{ENV_NODES} holds no usable nodes, ignoring"),
                Err(e) => tracing::warn!(error = %e, "invalid {ENV_NODES} format, ignoring"),
            }
        }
    }

    let candidates: Vec<PathBuf> = match std::env::var(ENV_CONFIG_PATH) {
        Ok(p) => vec![PathBuf::from(p)],
        Err(_) => vec![PathBuf::from("config.json"), PathBuf::from("config/digest.toml")],
    };
    for path in candidates {
        if !path.exists() {
            continue;
        }
        match load_nodes_from(&path) {
            Ok(v) if !v.is_empty() => return v,
            Ok(_) => tracing::warn!(path = %path.display(), "config file has no nodes"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to load node config"),
        }
    }

    default_nodes()
}

fn parse_nodes(s: &str, hint_ext: &str) -> Result<Vec<NodeConfig>> {
    let try_toml = hint_ext == "toml";
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported node config format"))
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum NodesDoc {
    Bare(Vec<NodeConfig>),
    Table { nodes: Vec<NodeConfig> },
}

impl NodesDoc {
    fn into_nodes(self) -> Vec<NodeConfig> {
        match self {
            NodesDoc::Bare(v) | NodesDoc::Table { nodes: v } => v,
        }
    }
}

fn parse_toml(s: &str) -> Result<Vec<NodeConfig>> {
    #[derive(serde::Deserialize)]
    struct TomlDoc {
        nodes: Vec<NodeConfig>,
    }
    let v: TomlDoc = toml::from_str(s)?;
    Ok(clean_list(v.nodes))
}

fn parse_json(s: &str) -> Result<Vec<NodeConfig>> {
    let v: NodesDoc = serde_json::from_str(s)?;
    Ok(clean_list(v.into_nodes()))
}

/// Trim names, drop empty ones, keep the first of each name.
fn clean_list(items: Vec<NodeConfig>) -> Vec<NodeConfig> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut it in items {
        it.name = it.name.trim().to_string();
        if it.name.is_empty() || !seen.insert(it.name.clone()) {
            continue;
        }
        it.title = it.title.trim().to_string();
        out.push(it);
    }
    out
}
