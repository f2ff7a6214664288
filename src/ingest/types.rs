// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Raw item as returned by the scraping collaborator. Serde renames match
/// the crawler's wire format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawStory {
    pub headline: String,
    pub link: String,
    #[serde(default)]
    pub date_posted: String,
    #[serde(default, rename = "fullContent")]
    pub full_content: Option<String>,
    #[serde(default, rename = "imageUrls")]
    pub image_urls: Vec<String>,
    #[serde(default, rename = "videoUrls")]
    pub video_urls: Vec<String>,
    #[serde(default)]
    pub popularity: Option<String>,
}

/// Per-source scrape envelope produced by the crawler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub source: String,
    #[serde(default)]
    pub stories: Vec<RawStory>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Where a story's full text ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMethod {
    Database,
    None,
}

/// A story that survived recency filtering and dedup. Enriched in place by
/// the text pipeline; immutable once handed to notification sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub headline: String,
    pub link: String,
    pub date_posted: String,
    pub full_content: Option<String>,
    pub image_urls: Vec<String>,
    pub video_urls: Vec<String>,
    pub popularity: Option<String>,
    pub category: Option<String>,
    pub content_storage_id: Option<String>,
    pub content_storage_method: StorageMethod,
    pub translated_headline: Option<String>,
    pub summary: Option<String>,
    pub bullet_summary: Option<String>,
}

impl Story {
    pub fn from_raw(raw: RawStory) -> Self {
        Self {
            headline: raw.headline,
            link: raw.link,
            date_posted: raw.date_posted,
            full_content: raw.full_content,
            image_urls: raw.image_urls,
            video_urls: raw.video_urls,
            popularity: raw.popularity,
            category: None,
            content_storage_id: None,
            content_storage_method: StorageMethod::None,
            translated_headline: None,
            summary: None,
            bullet_summary: None,
        }
    }

    /// Record the storage outcome, keeping id and method consistent: a
    /// story never carries an id together with `StorageMethod::None`.
    pub fn attach_storage(&mut self, stored: &crate::store::StoredContent) {
        match stored.method {
            StorageMethod::Database => {
                self.content_storage_id = stored.id.clone();
                self.content_storage_method = StorageMethod::Database;
            }
            StorageMethod::None => {
                self.content_storage_id = None;
                self.content_storage_method = StorageMethod::None;
            }
        }
    }
}

/// Externally supplied per-source fetch/filter limits. Zero means "not set";
/// config loading fills in the application defaults before the aggregator
/// ever sees the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub identifier: String,
    #[serde(default)]
    pub max_items: usize,
    #[serde(default)]
    pub timeframe_hours: i64,
}

/// Options forwarded to the scraping collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeOptions {
    pub max_items: usize,
    pub timeframe_hours: i64,
    pub llm_provider: String,
}

/// Scraping/rendering engine collaborator. Implementations must surface
/// failures as errors, not process-fatal panics; the aggregator logs and
/// continues on a failed source.
#[async_trait::async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, source_url: &str, opts: &ScrapeOptions) -> Result<Vec<RawStory>>;
    fn name(&self) -> &'static str;
}
