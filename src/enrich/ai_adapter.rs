//! AI adapter: provider abstraction + bounded retry with backoff.
//!
//! `Provider` makes exactly one remote call and reports why it failed.
//! `AiClient` is what the enricher sees: a prompt in, maybe some text out.
//! `RetryingClient` sits between them and owns the retry policy.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::config::ai::{AiConfig, AiProviderKind};

pub const USER_AGENT: &str = "forum-digest/0.1";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AiError {
    #[error("rate limited")]
    RateLimited,
    #[error("http status {0}")]
    Http(u16),
    #[error("transport: {0}")]
    Transport(String),
    #[error("empty completion")]
    Empty,
}

/// Trait object used by the enricher.
pub trait AiClient: Send + Sync {
    /// Run one prompt. `None` means "no data"; callers never see errors.
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynAiClient = Arc<dyn AiClient>;

/// Low-level provider: does a *real* remote call. Separated so the same
/// retry wrapper serves production and tests.
pub trait Provider: Send + Sync + 'static {
    fn fetch<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AiError>> + Send + 'a>>;
    fn name(&self) -> &'static str;
}

/// Factory. No API key, or an HTTP client that cannot be built, gives the
/// disabled client (enrichment is optional).
pub fn build_client_from_config(config: &AiConfig) -> DynAiClient {
    if !config.is_usable() {
        return Arc::new(DisabledClient);
    }
    let provider = match OpenAiProvider::new(config) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(target: "enrich", error = %e, "cannot build AI http client; enrichment disabled");
            return Arc::new(DisabledClient);
        }
    };
    Arc::new(RetryingClient::new(
        provider,
        config.max_retries,
        Duration::from_millis(config.retry_delay_ms),
    ))
}

// ------------------------------------------------------------
// OpenAI-compatible provider (Azure deployment or api.openai.com)
// ------------------------------------------------------------

pub struct OpenAiProvider {
    http: reqwest::Client,
    url: String,
    auth: Auth,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

enum Auth {
    /// Azure: `api-key` header.
    ApiKeyHeader(String),
    Bearer(String),
}

impl OpenAiProvider {
    pub fn new(config: &AiConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let (url, auth) = match config.provider {
            AiProviderKind::Azure => (
                format!(
                    "{}/openai/deployments/{}/chat/completions?api-version={}",
                    config.endpoint.trim_end_matches('/'),
                    config.model,
                    config.api_version
                ),
                Auth::ApiKeyHeader(config.api_key.clone()),
            ),
            AiProviderKind::OpenAi => (
                format!("{}/v1/chat/completions", config.endpoint.trim_end_matches('/')),
                Auth::Bearer(config.api_key.clone()),
            ),
        };
        Ok(Self {
            http,
            url,
            auth,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

impl Provider for OpenAiProvider {
    fn fetch<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AiError>> + Send + 'a>> {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_completion_tokens: u32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                #[serde(default)]
                content: Option<String>,
            }

            let req = Req {
                model: &self.model,
                messages: vec![Msg {
                    role: "user",
                    content: prompt,
                }],
                temperature: self.temperature,
                max_completion_tokens: self.max_tokens,
            };

            let builder = self.http.post(&self.url).json(&req);
            let builder = match &self.auth {
                Auth::ApiKeyHeader(k) => builder.header("api-key", k),
                Auth::Bearer(k) => builder.bearer_auth(k),
            };
            let resp = builder
                .send()
                .await
                .map_err(|e| AiError::Transport(e.to_string()))?;

            let status = resp.status();
            if status.as_u16() == 429 {
                return Err(AiError::RateLimited);
            }
            if !status.is_success() {
                return Err(AiError::Http(status.as_u16()));
            }
            let body: Resp = resp
                .json()
                .await
                .map_err(|e| AiError::Transport(e.to_string()))?;
            let content = body
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default();
            if content.trim().is_empty() {
                Err(AiError::Empty)
            } else {
                Ok(content)
            }
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Returns `None` always; used when no API key is configured.
pub struct DisabledClient;

impl AiClient for DisabledClient {
    fn complete<'a>(
        &'a self,
        _prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async { None })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Scripted provider for tests/local runs: pops responses front to back,
/// then keeps answering with `fallback`. Records every prompt it saw.
pub struct MockProvider {
    script: Mutex<Vec<Result<String, AiError>>>,
    fallback: Result<String, AiError>,
    prompts: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new(script: Vec<Result<String, AiError>>, fallback: Result<String, AiError>) -> Self {
        Self {
            script: Mutex::new(script),
            fallback,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn fixed(text: &str) -> Self {
        Self::new(Vec::new(), Ok(text.to_string()))
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Provider for MockProvider {
    fn fetch<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AiError>> + Send + 'a>> {
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt.to_string());
        }
        let next = match self.script.lock() {
            Ok(mut s) if !s.is_empty() => s.remove(0),
            _ => self.fallback.clone(),
        };
        Box::pin(async move { next })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

impl<P: Provider> Provider for Arc<P> {
    fn fetch<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AiError>> + Send + 'a>> {
        self.as_ref().fetch(prompt)
    }
    fn name(&self) -> &'static str {
        self.as_ref().name()
    }
}

// ------------------------------------------------------------
// Retry wrapper
// ------------------------------------------------------------

/// Up to `max_attempts` calls. Rate limits back off linearly
/// (`retry_delay * attempt`); other failures wait `retry_delay`.
pub struct RetryingClient<P: Provider> {
    inner: P,
    max_attempts: u32,
    retry_delay: Duration,
}

impl<P: Provider> RetryingClient<P> {
    pub fn new(inner: P, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    async fn complete_impl(&self, prompt: &str) -> Option<String> {
        for attempt in 1..=self.max_attempts {
            counter!("digest_enrich_calls_total").increment(1);
            match self.inner.fetch(prompt).await {
                Ok(text) => return Some(text),
                Err(AiError::RateLimited) => {
                    let wait = self.retry_delay * attempt;
                    tracing::warn!(target: "enrich", attempt, wait_ms = wait.as_millis() as u64, "rate limited, backing off");
                    if attempt < self.max_attempts {
                        tokio::time::sleep(wait).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(target: "enrich", attempt, error = %e, provider = self.inner.name(), "ai call failed");
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        counter!("digest_enrich_failures_total").increment(1);
        None
    }
}

impl<P: Provider> AiClient for RetryingClient<P> {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(self.complete_impl(prompt))
    }
    fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}
