//! Forum Digest: binary entrypoint.
//! One batch run per invocation: fetch, aggregate, summarize, deliver.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use forum_digest::config::ai::AiConfig;
use forum_digest::config::DigestConfig;
use forum_digest::engine::{DigestRun, EmailTarget, RssTarget, RunOutcome};
use forum_digest::enrich::{EnrichMode, Enricher};
use forum_digest::ingest::config::load_nodes_default;
use forum_digest::ingest::providers::V2exProvider;
use forum_digest::ingest::types::TopicSource;
use forum_digest::metrics::Metrics;
use forum_digest::notify::{mailer_from_env, Mailer};
use forum_digest::render::DigestMeta;

#[derive(Debug, Parser)]
#[command(name = "forum-digest", version, about = "Daily V2EX digest: hot topics plus per-node picks")]
struct Cli {
    /// Skip email delivery.
    #[arg(long)]
    no_email: bool,

    /// Skip writing the RSS feed.
    #[arg(long)]
    no_rss: bool,

    /// Fetch and render only; no email, no RSS. Implies --html-out if unset.
    #[arg(long)]
    dry_run: bool,

    /// Enrichment mode (brief|detailed). Overrides ENRICH_MODE.
    #[arg(long)]
    mode: Option<EnrichMode>,

    /// Rank node pools by reply count before capping.
    #[arg(long)]
    rank_by_popularity: bool,

    /// Also write the HTML body to this file.
    #[arg(long, value_name = "PATH")]
    html_out: Option<PathBuf>,

    /// Read topics from a directory of saved JSON pages instead of the network.
    #[arg(long, value_name = "DIR")]
    fixtures: Option<PathBuf>,
}

const DEFAULT_LOG_FILTER: &str = "forum_digest=info,ingest=info,enrich=info,notify=info,warn";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().compact().with_target(true)).init();
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    if let Err(e) = run(Cli::parse()).await {
        tracing::error!(error = %format!("{e:#}"), "digest run failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let email_enabled = !cli.no_email && !cli.dry_run;
    let rss_enabled = !cli.no_rss && !cli.dry_run;

    let mut cfg = DigestConfig::from_env().context("loading configuration")?;
    if let Some(mode) = cli.mode {
        cfg.enrich_mode = mode;
    }
    if cli.rank_by_popularity {
        cfg.rank_by_popularity = true;
    }
    cfg.validate(email_enabled).context("invalid configuration")?;

    let metrics = match &cfg.metrics_textfile {
        Some(path) => Some(Metrics::init(path)?),
        None => None,
    };

    let mailer: Option<Box<dyn Mailer>> = if email_enabled {
        let m = mailer_from_env().context("configuring email transport")?;
        if m.is_none() {
            tracing::warn!(target: "notify", "email enabled but no transport configured; delivery will fail");
        }
        m
    } else {
        None
    };

    let nodes = load_nodes_default();
    let source: Arc<dyn TopicSource> = match &cli.fixtures {
        Some(dir) => Arc::new(V2exProvider::from_fixture_dir(dir)?),
        None => Arc::new(V2exProvider::from_url(&cfg.api_base, &cfg.user_agent, cfg.http_timeout)?),
    };
    tracing::info!(
        source = source.name(),
        nodes = nodes.len(),
        mode = ?cfg.enrich_mode,
        email = email_enabled,
        rss = rss_enabled,
        "starting digest run"
    );

    let ai = match std::env::var("AI_CONFIG_PATH") {
        Ok(path) if !path.trim().is_empty() => {
            AiConfig::load_from_file(path.trim()).with_context(|| format!("loading AI config from {path}"))?
        }
        _ => AiConfig::from_env(),
    };
    let enricher = Enricher::from_config(&ai).with_replies(source.clone());
    if !enricher.is_enabled() {
        tracing::warn!(target: "enrich", "AI credentials not configured; summaries will be empty");
    }

    let now = Utc::now();
    let meta = DigestMeta::new(now, cfg.utc_offset_hours, &cfg.base_url).with_self_link(&cfg.rss_self_link);

    let html_out = cli.html_out.clone().or_else(|| {
        cli.dry_run
            .then(|| PathBuf::from("output/digest-preview.html"))
    });

    let digest_run = DigestRun {
        source: source.as_ref(),
        nodes: &nodes,
        options: cfg.aggregate_options(),
        enricher: Some(&enricher),
        enrich_mode: cfg.enrich_mode,
        meta,
        rss: rss_enabled.then(|| RssTarget {
            path: cfg.rss_output_path.clone(),
            max_items: cfg.rss_max_items,
        }),
        html_out,
        email: email_enabled
            .then(|| cfg.recipient.clone())
            .flatten()
            .map(|to| EmailTarget {
                from: cfg.mail_from.clone(),
                to,
            }),
        mailer: mailer.as_deref(),
    };

    let result = digest_run.execute(now).await;

    if let Some(m) = &metrics {
        if let Err(e) = m.write_textfile() {
            tracing::warn!(error = %format!("{e:#}"), "failed to write metrics textfile");
        }
    }

    let report = result?;
    match report.outcome {
        RunOutcome::NothingToDo => tracing::info!("no new topics today"),
        RunOutcome::Delivered {
            topics,
            rss_items,
            email_id,
        } => tracing::info!(topics, ?rss_items, ?email_id, "digest delivered"),
    }
    Ok(())
}
