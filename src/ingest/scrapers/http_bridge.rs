// src/ingest/scrapers/http_bridge.rs
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::ingest::types::{CrawlResult, RawStory, ScrapeOptions, Scraper};

/// Scraper speaking to an external crawler service over HTTP. The service
/// renders the page (headless browser) and answers with the crawl-result
/// envelope; this client only shuttles JSON.
pub struct HttpScraper {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    source: &'a str,
    max_items: usize,
    timeframe_hours: i64,
    llm_provider: &'a str,
}

impl HttpScraper {
    pub fn new(endpoint: String) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("ai-news-digest/0.1")
            .connect_timeout(Duration::from_secs(4))
            // Rendering a JS-heavy page takes a while; this bounds the whole
            // call so one slow source cannot eat the run.
            .timeout(Duration::from_secs(90))
            .build()
            .expect("reqwest client");
        Self { endpoint, client }
    }
}

#[async_trait::async_trait]
impl Scraper for HttpScraper {
    async fn scrape(&self, source_url: &str, opts: &ScrapeOptions) -> Result<Vec<RawStory>> {
        let req = ScrapeRequest {
            source: source_url,
            max_items: opts.max_items,
            timeframe_hours: opts.timeframe_hours,
            llm_provider: &opts.llm_provider,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&req)
            .send()
            .await
            .context("scraper bridge request")?
            .error_for_status()
            .context("scraper bridge non-2xx")?;

        let result: CrawlResult = resp.json().await.context("scraper bridge body")?;
        if let Some(err) = result.error {
            bail!("scraper reported error for {source_url}: {err}");
        }
        Ok(result.stories)
    }

    fn name(&self) -> &'static str {
        "http-bridge"
    }
}
