// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_AZURE_API_VERSION: &str = "2024-12-01-preview";
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProviderKind {
    #[default]
    Azure,
    #[serde(rename = "openai")]
    OpenAi,
}

fn default_batch_size() -> usize {
    10
}
fn default_batch_delay_ms() -> u64 {
    2_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    5_000
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub provider: AiProviderKind,
    /// "ENV" means: read from AZURE_OPENAI_KEY / OPENAI_API_KEY (by provider).
    #[serde(default)]
    pub api_key: String,
    /// Azure resource endpoint or OpenAI-compatible base URL.
    #[serde(default)]
    pub endpoint: String,
    /// Azure deployment name, or model name for OpenAI.
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub api_version: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between batches (brief mode) or topics (detailed mode).
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProviderKind::Azure,
            api_key: String::new(),
            endpoint: String::new(),
            model: String::new(),
            api_version: String::new(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_nonempty(name).and_then(|v| v.parse().ok())
}

fn key_env_for(provider: AiProviderKind) -> &'static str {
    match provider {
        AiProviderKind::Azure => "AZURE_OPENAI_KEY",
        AiProviderKind::OpenAi => "OPENAI_API_KEY",
    }
}

impl AiConfig {
    /// Read everything from the environment. A missing key is not an
    /// error: it simply leaves the config unusable (enrichment off).
    pub fn from_env() -> Self {
        let provider = match env_nonempty("AI_PROVIDER").map(|p| p.to_ascii_lowercase()) {
            Some(p) if p == "openai" => AiProviderKind::OpenAi,
            _ => AiProviderKind::Azure,
        };
        let mut cfg = Self {
            provider,
            api_key: env_nonempty(key_env_for(provider)).unwrap_or_default(),
            ..Self::default()
        };
        match provider {
            AiProviderKind::Azure => {
                cfg.endpoint = env_nonempty("AZURE_OPENAI_ENDPOINT").unwrap_or_default();
                cfg.model = env_nonempty("AZURE_OPENAI_DEPLOYMENT").unwrap_or_default();
                cfg.api_version = env_nonempty("AZURE_OPENAI_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string());
            }
            AiProviderKind::OpenAi => {
                cfg.endpoint = env_nonempty("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_ENDPOINT.to_string());
                cfg.model = env_nonempty("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
            }
        }
        if let Some(v) = env_parse("AI_BATCH_SIZE") {
            cfg.batch_size = v;
        }
        if let Some(v) = env_parse("AI_BATCH_DELAY_MS") {
            cfg.batch_delay_ms = v;
        }
        if let Some(v) = env_parse("AI_MAX_RETRIES") {
            cfg.max_retries = v;
        }
        if let Some(v) = env_parse("AI_RETRY_DELAY_MS") {
            cfg.retry_delay_ms = v;
        }
        cfg.sanitize();
        cfg
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: AiConfig = serde_json::from_str(&data)?;

        // Resolve api key if "ENV". Unset means enrichment off, not a failed run.
        if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            let var = key_env_for(cfg.provider);
            cfg.api_key = env_nonempty(var).unwrap_or_else(|| {
                tracing::warn!(target: "enrich", "{var} not set; AI config has no key");
                String::new()
            });
        }
        if cfg.api_version.is_empty() && cfg.provider == AiProviderKind::Azure {
            cfg.api_version = DEFAULT_AZURE_API_VERSION.to_string();
        }
        if cfg.endpoint.is_empty() && cfg.provider == AiProviderKind::OpenAi {
            cfg.endpoint = DEFAULT_OPENAI_ENDPOINT.to_string();
        }
        cfg.sanitize();
        Ok(cfg)
    }

    fn sanitize(&mut self) {
        if self.batch_size == 0 {
            self.batch_size = default_batch_size();
        }
        if self.max_retries == 0 {
            self.max_retries = 1;
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
    }

    /// Key, endpoint and model are all needed for a real call.
    pub fn is_usable(&self) -> bool {
        !self.api_key.is_empty() && !self.endpoint.is_empty() && !self.model.is_empty()
    }
}
