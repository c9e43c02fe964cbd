use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EmailMessage, Mailer};

pub const DEFAULT_API_BASE: &str = "https://api.resend.com";
/// Upper bound on send attempts, whatever `with_retries` is given.
pub const MAX_ATTEMPTS: u8 = 10;

#[derive(Clone)]
pub struct ResendMailer {
    api_key: String,
    api_base: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
    backoff: Duration,
}

impl ResendMailer {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            api_base: DEFAULT_API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff: Duration::from_millis(500),
        }
    }

    /// `None` when `RESEND_API_KEY` is unset or empty.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var("RESEND_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
        let mut m = Self::new(key);
        if let Ok(base) = std::env::var("RESEND_API_BASE") {
            if !base.trim().is_empty() {
                m = m.with_api_base(&base);
            }
        }
        Some(m)
    }

    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retries(mut self, retries: u8, backoff: Duration) -> Self {
        self.max_retries = retries.clamp(1, MAX_ATTEMPTS);
        self.backoff = backoff;
        self
    }
}

#[derive(Serialize)]
struct SendPayload<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    id: String,
}

#[async_trait::async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, msg: &EmailMessage) -> Result<String> {
        let payload = SendPayload {
            from: &msg.from,
            to: &msg.to,
            subject: &msg.subject,
            html: &msg.html,
        };
        let url = format!("{}/emails", self.api_base);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let factor = 1u32.checked_shl(u32::from(attempt - 1)).unwrap_or(u32::MAX);
            let retry_in = self.backoff.saturating_mul(factor);
            match res {
                Ok(rsp) => {
                    let status = rsp.status();
                    if status.is_success() {
                        let body: SendResponse = rsp.json().await.context("resend response body")?;
                        return Ok(body.id);
                    }
                    // 4xx other than 429 is a request problem; retrying won't help.
                    let retryable = status.is_server_error() || status.as_u16() == 429;
                    if retryable && attempt < self.max_retries {
                        tracing::warn!(target: "notify", %status, attempt, "resend error, retrying");
                        tokio::time::sleep(retry_in).await;
                        continue;
                    }
                    let text = rsp.text().await.unwrap_or_default();
                    return Err(anyhow!("Resend HTTP error {status}: {text}"));
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tracing::warn!(target: "notify", error = %e, attempt, "resend request failed, retrying");
                        tokio::time::sleep(retry_in).await;
                        continue;
                    }
                    return Err(anyhow!("Resend request failed: {e}"));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "resend"
    }
}
