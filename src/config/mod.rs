// src/config/mod.rs
//! Run configuration, read once at process start.

pub mod ai;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::enrich::EnrichMode;
use crate::ingest::providers::v2ex::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::ingest::{AggregateOptions, DEFAULT_BASE_URL, HOT_LIMIT, NODE_FETCH_LIMIT, NODE_POOL_CAP, RECENCY_WINDOW_HOURS};
use crate::notify::DEFAULT_FROM;
use crate::render::rss::DEFAULT_MAX_ITEMS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Digest run configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    /// Recipient; required only when email delivery is enabled.
    pub recipient: Option<String>,
    pub mail_from: String,

    // Upstream
    pub base_url: String,
    pub api_base: String,
    pub user_agent: String,
    pub http_timeout: Duration,

    // Aggregation
    pub hot_limit: usize,
    pub node_fetch_limit: usize,
    pub node_pool_cap: usize,
    pub recency_window_hours: i64,
    pub rank_by_popularity: bool,
    pub with_dedup: bool,
    pub filter_hot_by_recency: bool,
    pub fetch_concurrency: usize,

    // Enrichment
    pub enrich_mode: EnrichMode,

    // Output
    pub rss_output_path: PathBuf,
    pub rss_max_items: usize,
    pub rss_self_link: String,
    pub utc_offset_hours: i32,
    pub metrics_textfile: Option<PathBuf>,
}

impl DigestConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env_or_default("V2EX_BASE_URL", DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            recipient: optional_env("TO_EMAIL"),
            mail_from: env_or_default("DIGEST_MAIL_FROM", DEFAULT_FROM),

            api_base: optional_env("V2EX_API_BASE")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|| base_url.clone()),
            base_url,
            user_agent: env_or_default("DIGEST_USER_AGENT", DEFAULT_USER_AGENT),
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?),

            hot_limit: parse_env_usize("HOT_LIMIT", HOT_LIMIT)?,
            node_fetch_limit: parse_env_usize("NODE_FETCH_LIMIT", NODE_FETCH_LIMIT)?,
            node_pool_cap: parse_env_usize("NODE_POOL_CAP", NODE_POOL_CAP)?,
            recency_window_hours: parse_env_i64("RECENCY_WINDOW_HOURS", RECENCY_WINDOW_HOURS)?,
            rank_by_popularity: parse_env_bool("RANK_BY_POPULARITY", false)?,
            with_dedup: parse_env_bool("DIGEST_DEDUP", true)?,
            filter_hot_by_recency: parse_env_bool("FILTER_HOT_BY_RECENCY", false)?,
            fetch_concurrency: parse_env_usize("FETCH_CONCURRENCY", 4)?,

            enrich_mode: parse_enrich_mode(&env_or_default("ENRICH_MODE", "brief"))?,

            rss_output_path: PathBuf::from(env_or_default("RSS_OUTPUT_PATH", "output/v2ex-digest.xml")),
            rss_max_items: parse_env_usize("RSS_MAX_ITEMS", DEFAULT_MAX_ITEMS)?,
            rss_self_link: env_or_default(
                "RSS_SELF_LINK",
                "https://zero469.github.io/v2ex-daily-digest/v2ex-digest.xml",
            ),
            utc_offset_hours: parse_env_i64("DIGEST_UTC_OFFSET_HOURS", 8)?
                .clamp(-23, 23) as i32,
            metrics_textfile: optional_env("METRICS_TEXTFILE_PATH").map(PathBuf::from),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self, email_enabled: bool) -> Result<(), ConfigError> {
        if email_enabled && self.recipient.is_none() {
            return Err(ConfigError::MissingEnvVar("TO_EMAIL".to_string()));
        }
        if self.recency_window_hours <= 0 {
            return Err(ConfigError::InvalidValue {
                name: "RECENCY_WINDOW_HOURS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.recency_window().is_none() {
            return Err(ConfigError::InvalidValue {
                name: "RECENCY_WINDOW_HOURS".to_string(),
                message: format!("{} hours is out of range", self.recency_window_hours),
            });
        }
        if self.fetch_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "FETCH_CONCURRENCY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.base_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "V2EX_BASE_URL".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// The window as a duration, or `None` when the hour count cannot be
    /// represented or reaches past the earliest representable timestamp.
    pub fn recency_window(&self) -> Option<chrono::Duration> {
        chrono::Duration::try_hours(self.recency_window_hours)
            .filter(|w| chrono::Utc::now().checked_sub_signed(*w).is_some())
    }

    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            hot_limit: self.hot_limit,
            node_fetch_limit: self.node_fetch_limit,
            node_pool_cap: self.node_pool_cap,
            recency_window: self
                .recency_window()
                .unwrap_or_else(|| chrono::Duration::hours(RECENCY_WINDOW_HOURS)),
            rank_by_popularity: self.rank_by_popularity,
            with_dedup: self.with_dedup,
            filter_hot_by_recency: self.filter_hot_by_recency,
            fetch_concurrency: self.fetch_concurrency,
            base_url: self.base_url.clone(),
        }
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    optional_env(name).unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match optional_env(name) {
        Some(val) => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        None => Ok(default),
    }
}

fn parse_env_i64(name: &str, default: i64) -> Result<i64, ConfigError> {
    match optional_env(name) {
        Some(val) => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        None => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match optional_env(name) {
        Some(val) => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        None => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match optional_env(name) {
        Some(val) => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        None => Ok(default),
    }
}

fn parse_enrich_mode(value: &str) -> Result<EnrichMode, ConfigError> {
    value.parse().map_err(|message| ConfigError::InvalidValue {
        name: "ENRICH_MODE".to_string(),
        message,
    })
}
