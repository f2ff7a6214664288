// src/ingest/scrapers/fixture.rs
use anyhow::{Context, Result};

use crate::ingest::types::{CrawlResult, RawStory, ScrapeOptions, Scraper};

/// Scraper backed by a canned crawl-result JSON document (the same envelope
/// the HTTP bridge speaks). Used by tests and offline runs.
pub struct FixtureScraper {
    raw: String,
}

impl FixtureScraper {
    pub fn from_json(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
        }
    }

    pub fn from_results(results: &[CrawlResult]) -> Self {
        Self {
            raw: serde_json::to_string(results).unwrap_or_else(|_| "[]".to_string()),
        }
    }
}

#[async_trait::async_trait]
impl Scraper for FixtureScraper {
    async fn scrape(&self, source_url: &str, opts: &ScrapeOptions) -> Result<Vec<RawStory>> {
        let results: Vec<CrawlResult> =
            serde_json::from_str(&self.raw).context("parsing fixture crawl results")?;
        let mut stories = results
            .into_iter()
            .find(|r| r.source == source_url)
            .map(|r| r.stories)
            .unwrap_or_default();
        stories.truncate(opts.max_items);
        Ok(stories)
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
