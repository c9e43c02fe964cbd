//! # Digest run
//! One batch run: aggregate → enrich → render → deliver.
//!
//! Policy: an empty digest is a successful run that skips delivery. Each
//! delivery target is attempted even if an earlier one failed; the run
//! fails if any of them did.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::enrich::{EnrichMode, Enricher};
use crate::ingest::types::{DigestResult, NodeConfig, TopicSource};
use crate::ingest::{aggregate, AggregateOptions};
use crate::notify::{EmailMessage, Mailer};
use crate::render::{email_subject, html, rss, DigestMeta};

#[derive(Debug, Clone)]
pub struct RssTarget {
    pub path: PathBuf,
    pub max_items: usize,
}

#[derive(Debug, Clone)]
pub struct EmailTarget {
    pub from: String,
    pub to: String,
}

/// Everything a run needs. Borrowed so callers keep ownership of clients.
pub struct DigestRun<'a> {
    pub source: &'a dyn TopicSource,
    pub nodes: &'a [NodeConfig],
    pub options: AggregateOptions,
    pub enricher: Option<&'a Enricher>,
    pub enrich_mode: EnrichMode,
    pub meta: DigestMeta,
    pub rss: Option<RssTarget>,
    pub html_out: Option<PathBuf>,
    pub email: Option<EmailTarget>,
    pub mailer: Option<&'a dyn Mailer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No topics anywhere; nothing was rendered or sent.
    NothingToDo,
    Delivered {
        topics: usize,
        rss_items: Option<usize>,
        email_id: Option<String>,
    },
}

#[derive(Debug)]
pub struct RunReport {
    pub digest: DigestResult,
    pub outcome: RunOutcome,
}

impl DigestRun<'_> {
    pub async fn execute(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let mut digest = aggregate(self.source, self.nodes, &self.options, now).await;

        let total = digest.total();
        if total == 0 {
            tracing::info!("no topics found in any pool, skipping delivery");
            return Ok(RunReport {
                digest,
                outcome: RunOutcome::NothingToDo,
            });
        }

        if let Some(enricher) = self.enricher {
            enricher.enrich_digest(&mut digest, self.enrich_mode).await;
        }

        let mut failures: Vec<anyhow::Error> = Vec::new();

        let rss_items = match &self.rss {
            Some(target) => match rss::write_rss(&digest, &self.meta, target.max_items, &target.path) {
                Ok(n) => Some(n),
                Err(e) => {
                    tracing::error!(target: "notify", error = %format!("{e:#}"), "rss delivery failed");
                    failures.push(e);
                    None
                }
            },
            None => None,
        };

        let body = html::render_html(&digest, &self.meta);

        if let Some(path) = &self.html_out {
            if let Err(e) = write_html(path, &body) {
                tracing::error!(target: "notify", error = %format!("{e:#}"), "html output failed");
                failures.push(e);
            }
        }

        let email_id = match &self.email {
            Some(target) => match self.send_email(target, total, body).await {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::error!(target: "notify", error = %format!("{e:#}"), "email delivery failed");
                    failures.push(e);
                    None
                }
            },
            None => None,
        };

        if let Some(first) = failures.into_iter().next() {
            return Err(first.context("delivery failed"));
        }

        Ok(RunReport {
            digest,
            outcome: RunOutcome::Delivered {
                topics: total,
                rss_items,
                email_id,
            },
        })
    }

    async fn send_email(&self, target: &EmailTarget, total: usize, html: String) -> Result<String> {
        let mailer = self
            .mailer
            .ok_or_else(|| anyhow!("no email transport configured (set RESEND_API_KEY or SMTP_HOST)"))?;
        let msg = EmailMessage {
            from: target.from.clone(),
            to: vec![target.to.clone()],
            subject: email_subject(&self.meta, total),
            html,
        };
        let id = mailer
            .send(&msg)
            .await
            .with_context(|| format!("sending digest via {}", mailer.name()))?;
        tracing::info!(target: "notify", transport = mailer.name(), %id, to = %target.to, "email sent");
        Ok(id)
    }
}

fn write_html(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating html output dir {}", parent.display()))?;
    }
    std::fs::write(path, body).with_context(|| format!("writing html to {}", path.display()))
}
