use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{EmailMessage, Mailer};

/// SMTP fallback transport.
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(host: &str, user: String, pass: String) -> Result<Self> {
        let creds = Credentials::new(user, pass);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .with_context(|| format!("invalid SMTP_HOST {host}"))?
            .credentials(creds)
            .build();
        Ok(Self { mailer })
    }

    /// `Ok(None)` when `SMTP_HOST` is unset. With a host set, missing
    /// credentials are an error.
    pub fn from_env() -> Result<Option<Self>> {
        let Some(host) = std::env::var("SMTP_HOST").ok().filter(|h| !h.trim().is_empty()) else {
            return Ok(None);
        };
        let user = std::env::var("SMTP_USER").context("SMTP_USER missing")?;
        let pass = std::env::var("SMTP_PASS").context("SMTP_PASS missing")?;
        Self::new(host.trim(), user, pass).map(Some)
    }
}

/// Build the MIME message; split out so it can be checked without a server.
pub fn build_message(msg: &EmailMessage) -> Result<Message> {
    let from: Mailbox = msg.from.parse().context("invalid sender address")?;
    let mut builder = Message::builder().from(from).subject(msg.subject.clone());
    for to in &msg.to {
        let mb: Mailbox = to
            .parse()
            .with_context(|| format!("invalid recipient address {to}"))?;
        builder = builder.to(mb);
    }
    builder
        .header(header::ContentType::TEXT_HTML)
        .body(msg.html.clone())
        .context("build email")
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, msg: &EmailMessage) -> Result<String> {
        let message = build_message(msg)?;
        let resp = self.mailer.send(message).await.context("send email")?;
        Ok(resp.message().collect::<Vec<_>>().join(" "))
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_builds_with_display_name_sender() {
        let msg = EmailMessage {
            from: "V2EX Daily <digest@resend.dev>".into(),
            to: vec!["me@example.com".into()],
            subject: "📰 digest".into(),
            html: "<p>hi</p>".into(),
        };
        assert!(build_message(&msg).is_ok());
    }

    #[test]
    fn bad_recipient_is_an_error() {
        let msg = EmailMessage {
            from: "digest@resend.dev".into(),
            to: vec!["not an address".into()],
            subject: "s".into(),
            html: String::new(),
        };
        assert!(build_message(&msg).is_err());
    }
}
