// src/ingest/mod.rs
pub mod scrapers;
pub mod types;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use rand::Rng;
use regex::Regex;
use std::time::Duration;
use url::Url;

use crate::ingest::types::{RawStory, ScrapeOptions, Scraper, SourceConfig, Story};
use crate::recency;

/// Headline similarity at or above this collapses two stories as duplicates.
const NEAR_DUPLICATE_THRESHOLD: f64 = 0.90;

/// One-time metrics registration (so series show up wherever they are
/// exported).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("crawl_stories_total", "Raw stories returned by the scraper.");
        describe_counter!(
            "crawl_kept_total",
            "Stories kept after recency filtering and dedup."
        );
        describe_counter!(
            "crawl_stale_total",
            "Stories discarded by the recency classifier."
        );
        describe_counter!(
            "crawl_fallback_total",
            "Sources rescued via the most-recent-item fallback."
        );
        describe_counter!("crawl_dedup_total", "Stories removed by deduplication.");
        describe_counter!("crawl_source_errors_total", "Scrape failures per source.");
        describe_gauge!("crawl_last_run_ts", "Unix ts when collection last ran.");
    });
}

/// Normalize scraped headline text: decode HTML entities, strip leftover
/// tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Randomized inter-source delay. The whole throttling policy lives here:
/// sources are drained one at a time with one `pause` between consecutive
/// fetches, nothing else sleeps.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    min_ms: u64,
    max_ms: u64,
}

impl Throttle {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        let (min_ms, max_ms) = if min_ms <= max_ms {
            (min_ms, max_ms)
        } else {
            (max_ms, min_ms)
        };
        Self { min_ms, max_ms }
    }

    /// Zero-delay throttle for tests and fixture runs.
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn next_delay(&self) -> Duration {
        if self.min_ms == self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        let ms = rand::rng().random_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub llm_provider: String,
    /// Hard ceiling (hours) for the zero-recent-items fallback. Independent
    /// of the per-source window: a source whose freshest item missed its
    /// window can still contribute that one item as long as it is younger
    /// than this ceiling.
    pub fallback_ceiling_hours: i64,
    pub dedup_by_domain: bool,
    pub throttle: Throttle,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            llm_provider: "openai".to_string(),
            fallback_ceiling_hours: 24,
            dedup_by_domain: true,
            throttle: Throttle::new(2_000, 5_000),
        }
    }
}

/// Fetch every configured source sequentially (rate-limit friendly), filter
/// each source's items for freshness, then dedup across sources. A failing
/// source is logged and skipped; the batch always returns what it has.
pub async fn collect(
    scraper: &dyn Scraper,
    sources: &[SourceConfig],
    opts: &CollectOptions,
) -> Vec<Story> {
    ensure_metrics_described();
    let now = Utc::now();

    let mut gathered: Vec<Story> = Vec::new();
    for (i, source) in sources.iter().enumerate() {
        if i > 0 {
            opts.throttle.pause().await;
        }

        let scrape_opts = ScrapeOptions {
            max_items: source.max_items.max(1),
            timeframe_hours: source.timeframe_hours.max(1),
            llm_provider: opts.llm_provider.clone(),
        };
        let mut raw = match scraper.scrape(&source.identifier, &scrape_opts).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = ?e, source = %source.identifier, "scrape failed, skipping source");
                counter!("crawl_source_errors_total").increment(1);
                continue;
            }
        };
        // The collaborator is asked for max_items; enforce the cap anyway.
        raw.truncate(scrape_opts.max_items);
        counter!("crawl_stories_total").increment(raw.len() as u64);

        for story in &mut raw {
            story.headline = normalize_text(&story.headline);
            if let Some(content) = story.full_content.take() {
                // Entities only; tag stripping and whitespace collapse would
                // destroy article structure.
                story.full_content =
                    Some(html_escape::decode_html_entities(&content).to_string());
            }
        }

        let kept = sift_source(
            now,
            raw,
            scrape_opts.timeframe_hours,
            opts.fallback_ceiling_hours,
        );
        tracing::debug!(source = %source.identifier, kept = kept.len(), "source sifted");
        gathered.extend(kept.into_iter().map(Story::from_raw));
    }

    let before = gathered.len();
    let deduped = dedup_stories(now, gathered, opts.dedup_by_domain);
    let removed = before - deduped.len();

    counter!("crawl_kept_total").increment(deduped.len() as u64);
    counter!("crawl_dedup_total").increment(removed as u64);
    gauge!("crawl_last_run_ts").set(now.timestamp().max(0) as f64);

    deduped
}

/// Per-source freshness pass. Items inside the window pass through; when a
/// source yields raw items but none are fresh, the single best-ranked item
/// is rescued, unless even that one is older than the hard ceiling, in
/// which case the source contributes nothing.
pub fn sift_source(
    now: DateTime<Utc>,
    raw: Vec<RawStory>,
    window_hours: i64,
    fallback_ceiling_hours: i64,
) -> Vec<RawStory> {
    if raw.is_empty() {
        return raw;
    }

    let (recent, stale): (Vec<_>, Vec<_>) = raw
        .into_iter()
        .partition(|s| recency::is_recent_at(now, &s.date_posted, window_hours));
    counter!("crawl_stale_total").increment(stale.len() as u64);
    if !recent.is_empty() {
        return recent;
    }

    let best = stale
        .into_iter()
        .min_by_key(|s| recency::recency_rank_at(now, &s.date_posted));
    match best {
        Some(item)
            if recency::recency_rank_at(now, &item.date_posted) <= fallback_ceiling_hours =>
        {
            counter!("crawl_fallback_total").increment(1);
            vec![item]
        }
        _ => Vec::new(),
    }
}

/// Cross-source dedup. With `by_domain` set, stories sharing a normalized
/// domain collapse to the most recent one; near-identical headlines collapse
/// regardless, keeping the first-seen story.
pub fn dedup_stories(now: DateTime<Utc>, stories: Vec<Story>, by_domain: bool) -> Vec<Story> {
    let mut kept: Vec<(Story, String, i64)> = Vec::with_capacity(stories.len());

    for story in stories {
        let key = normalize_domain(&story.link).unwrap_or_else(|| story.link.clone());
        let rank = recency::recency_rank_at(now, &story.date_posted);

        if by_domain {
            if let Some(existing) = kept.iter_mut().find(|(_, k, _)| *k == key) {
                // Strictly more recent replaces; ties keep the first seen.
                if rank < existing.2 {
                    *existing = (story, key, rank);
                }
                continue;
            }
        }
        kept.push((story, key, rank));
    }

    let mut out: Vec<Story> = Vec::with_capacity(kept.len());
    for (story, _, _) in kept {
        let duplicate = out
            .iter()
            .any(|s| near_duplicate(&s.headline, &story.headline));
        if duplicate {
            tracing::debug!(headline = %story.headline, "near-duplicate headline dropped");
            continue;
        }
        out.push(story);
    }
    out
}

/// Normalized domain: scheme + lowercased host, `www.` stripped, path and
/// query discarded. `a.com` and `a.com/blog` normalize identically.
pub fn normalize_domain(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    Some(format!("{}://{}", url.scheme(), host))
}

fn near_duplicate(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
        >= NEAR_DUPLICATE_THRESHOLD
}
