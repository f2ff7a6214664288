//! AI News Digest — Binary Entrypoint
//! One-shot run: collect fresh stories, enrich them through the LLM
//! pipeline, publish the digest to every configured sink, exit. An external
//! scheduler (cron, CI) drives periodicity.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ai_news_digest::cache::TtlCache;
use ai_news_digest::config;
use ai_news_digest::ingest::scrapers::http_bridge::HttpScraper;
use ai_news_digest::notify::docapi::DocApiNotifier;
use ai_news_digest::notify::webhook::WebhookNotifier;
use ai_news_digest::notify::NotifierMux;
use ai_news_digest::pipeline::llm::OpenAiClient;
use ai_news_digest::runner::Runner;
use ai_news_digest::store::ContentArchive;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in CI where secrets arrive as real env.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = config::load_default().context("loading configuration")?;
    tracing::info!(sources = cfg.sources.len(), "configuration loaded");

    let endpoint = cfg
        .scraper_endpoint
        .clone()
        .or_else(|| std::env::var("SCRAPER_ENDPOINT").ok())
        .context("no scraper endpoint configured (config `scraper_endpoint` or $SCRAPER_ENDPOINT)")?;
    let scraper = Arc::new(HttpScraper::new(endpoint));

    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
    let llm = Arc::new(
        OpenAiClient::new(api_key, cfg.llm.model.clone()).with_retries(cfg.max_retries),
    );

    let cache = Arc::new(TtlCache::new());
    // No content store is wired by default; the archive degrades to
    // method=none and the pipeline carries on.
    let archive = ContentArchive::disabled();

    let mut mux = NotifierMux::new();
    if let Ok(url) = std::env::var("WEBHOOK_URL") {
        mux.push(Box::new(
            WebhookNotifier::new(url).with_retries(cfg.max_retries as u8),
        ));
    }
    if let Some(doc) = &cfg.doc_api {
        if let Ok(token) = std::env::var("DOC_API_TOKEN") {
            mux.push(Box::new(DocApiNotifier::new(
                doc.base_url.clone(),
                token,
                doc.database_id.clone(),
            )));
        } else {
            tracing::warn!("doc_api configured but $DOC_API_TOKEN missing, sink disabled");
        }
    }

    let runner = Runner::new(scraper, llm, cache, archive, cfg);
    let report = runner.run_once().await;

    if mux.is_empty() {
        // Nowhere to publish: print the digest so a bare run is still useful.
        println!("{}", ai_news_digest::notify::render_markdown(&report.digest));
    } else {
        let delivered = mux.publish_all(&report.digest).await;
        tracing::info!(delivered, stories = report.story_count, "digest delivered");
    }

    Ok(())
}
