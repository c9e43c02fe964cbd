// src/notify/mod.rs
//! Digest delivery over email. Two transports behind one trait: the Resend
//! HTTP API and plain SMTP.

pub mod email;
pub mod resend;

use anyhow::Result;

pub use email::SmtpMailer;
pub use resend::ResendMailer;

pub const DEFAULT_FROM: &str = "V2EX Daily <digest@resend.dev>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message; returns the provider's message id (may be empty).
    async fn send(&self, msg: &EmailMessage) -> Result<String>;
    fn name(&self) -> &'static str;
}

/// Pick a transport from the environment: Resend when `RESEND_API_KEY` is
/// set, SMTP when `SMTP_HOST` is set, otherwise none.
pub fn mailer_from_env() -> Result<Option<Box<dyn Mailer>>> {
    if let Some(m) = ResendMailer::from_env() {
        return Ok(Some(Box::new(m)));
    }
    if let Some(m) = SmtpMailer::from_env()? {
        return Ok(Some(Box::new(m)));
    }
    Ok(None)
}
