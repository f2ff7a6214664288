// src/runner.rs
//! One end-to-end pipeline run: collect → archive → enrich → compose →
//! extract. Every collaborator failure degrades; the run always produces a
//! digest, worst case a single placeholder item.

use std::sync::Arc;

use serde::Serialize;

use crate::cache::TtlCache;
use crate::category::{self, DEFAULT_CATEGORY};
use crate::config::AppConfig;
use crate::extract::{self, Digest, DigestItem, Fidelity};
use crate::ingest::{self, types::Scraper, types::Story};
use crate::pipeline::llm::{ChatMessage, CompletionRequest, LlmClient};
use crate::pipeline::{TextPipeline, FALLBACK_SUMMARY};
use crate::store::ContentArchive;

pub struct Runner {
    scraper: Arc<dyn Scraper>,
    llm: Arc<dyn LlmClient>,
    cache: Arc<TtlCache<String>>,
    archive: ContentArchive,
    config: AppConfig,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub digest: Digest,
    pub fidelity: Fidelity,
    pub story_count: usize,
}

/// Per-story view handed to the digest-composition prompt.
#[derive(Serialize)]
struct DigestInput<'a> {
    headline: &'a str,
    summary: &'a str,
    category: &'a str,
    link: &'a str,
}

impl Runner {
    pub fn new(
        scraper: Arc<dyn Scraper>,
        llm: Arc<dyn LlmClient>,
        cache: Arc<TtlCache<String>>,
        archive: ContentArchive,
        config: AppConfig,
    ) -> Self {
        Self {
            scraper,
            llm,
            cache,
            archive,
            config,
        }
    }

    pub async fn run_once(&self) -> RunReport {
        let swept = self.cache.clean_expired();
        if swept > 0 {
            tracing::debug!(swept, "cache swept before run");
        }

        let mut stories = ingest::collect(
            self.scraper.as_ref(),
            &self.config.sources,
            &self.config.collect_options(),
        )
        .await;

        if stories.is_empty() {
            tracing::warn!("no stories collected, publishing placeholder digest");
            return RunReport {
                digest: placeholder_digest(),
                fidelity: Fidelity::Parsed,
                story_count: 0,
            };
        }

        self.archive_stories(&mut stories).await;
        self.enrich_stories(&mut stories).await;

        let (digest, fidelity) = self.compose_digest(&stories).await;
        tracing::info!(
            stories = stories.len(),
            digest_items = digest.stories.len(),
            fidelity = ?fidelity,
            "run complete"
        );
        RunReport {
            digest,
            fidelity,
            story_count: stories.len(),
        }
    }

    async fn archive_stories(&self, stories: &mut [Story]) {
        for story in stories.iter_mut() {
            let Some(content) = story.full_content.as_deref() else {
                continue;
            };
            if content.trim().is_empty() {
                continue;
            }
            let key = ContentArchive::content_key(&story.headline, &story.link);
            let stored = self.archive.put(&key, &story.headline, content).await;
            story.attach_storage(&stored);
        }
    }

    /// Translate headlines, summarize content, bullet-ize summaries and
    /// classify, writing results back onto the stories in input order.
    async fn enrich_stories(&self, stories: &mut [Story]) {
        let pipeline = TextPipeline::new(
            self.llm.clone(),
            self.cache.clone(),
            self.config.target_language.clone(),
        );

        let headlines: Vec<String> = stories.iter().map(|s| s.headline.clone()).collect();
        let contents: Vec<String> = stories
            .iter()
            .map(|s| s.full_content.clone().unwrap_or_default())
            .collect();

        let translated = pipeline.translate_batch(&headlines).await;
        let summaries = pipeline.summarize_batch(&contents).await;

        // No point bullet-izing a placeholder summary.
        let bullet_inputs: Vec<String> = summaries
            .iter()
            .map(|s| {
                if s == FALLBACK_SUMMARY {
                    String::new()
                } else {
                    s.clone()
                }
            })
            .collect();
        let bullets = pipeline.bulletize_batch(&bullet_inputs).await;

        for (i, story) in stories.iter_mut().enumerate() {
            story.translated_headline = Some(translated[i].clone());
            story.summary = Some(summaries[i].clone());
            story.bullet_summary = Some(bullets[i].clone());
            let text = format!(
                "{} {}",
                story.headline,
                story.full_content.as_deref().unwrap_or_default()
            );
            story.category = Some(
                category::classify(story.category.as_deref(), &text)
                    .as_str()
                    .to_string(),
            );
        }
    }

    /// Ask the LLM to compose the final digest as JSON and run it through
    /// the repair ladder. If the composition call itself fails, assemble the
    /// digest locally from the enriched stories instead.
    async fn compose_digest(&self, stories: &[Story]) -> (Digest, Fidelity) {
        let req = CompletionRequest {
            messages: self.digest_messages(stories),
            temperature: self.config.llm.temperature,
            max_tokens: 2_000,
            json_mode: true,
        };

        let raw = match self.llm.complete(req).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = ?e, "digest composition failed, assembling locally");
                return (local_digest(stories), Fidelity::Parsed);
            }
        };

        let extraction = extract::extract_digest(&raw);
        let mut digest = extraction.digest;
        if digest.stories.is_empty() {
            tracing::warn!("composed digest had no stories, assembling locally");
            return (local_digest(stories), extraction.fidelity);
        }

        // The model occasionally invents category labels; pin every item
        // back onto the fixed set.
        for item in &mut digest.stories {
            let cat = category::classify(
                Some(&item.category),
                &format!("{} {}", item.headline, item.summary),
            );
            item.category = cat.as_str().to_string();
        }
        (digest, extraction.fidelity)
    }

    fn digest_messages(&self, stories: &[Story]) -> Vec<ChatMessage> {
        let lang = &self.config.target_language;
        let categories = category::ALL_CATEGORIES
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let system = format!(
            "You are an editor composing a daily AI-news digest in {lang}. \
             Respond with a JSON object of the form \
             {{\"stories\": [{{\"headline\": \"...\", \"summary\": \"...\", \"category\": \"...\", \"link\": \"...\"}}]}}. \
             Category must be one of: {categories}. Output only JSON."
        );

        let inputs: Vec<DigestInput<'_>> = stories
            .iter()
            .map(|s| DigestInput {
                headline: s.translated_headline.as_deref().unwrap_or(&s.headline),
                summary: s.summary.as_deref().unwrap_or(FALLBACK_SUMMARY),
                category: s.category.as_deref().unwrap_or(DEFAULT_CATEGORY.as_str()),
                link: &s.link,
            })
            .collect();
        let user = serde_json::to_string_pretty(&inputs).unwrap_or_else(|_| "[]".to_string());

        vec![ChatMessage::system(system), ChatMessage::user(user)]
    }
}

/// Digest assembled directly from enriched stories, bypassing the LLM.
fn local_digest(stories: &[Story]) -> Digest {
    let items = stories
        .iter()
        .map(|s| DigestItem {
            headline: s
                .translated_headline
                .clone()
                .unwrap_or_else(|| s.headline.clone()),
            summary: s
                .summary
                .clone()
                .unwrap_or_else(|| FALLBACK_SUMMARY.to_string()),
            category: s
                .category
                .clone()
                .unwrap_or_else(|| DEFAULT_CATEGORY.as_str().to_string()),
            link: s.link.clone(),
        })
        .collect();
    Digest { stories: items }
}

/// What a fully-failed run publishes instead of nothing.
pub fn placeholder_digest() -> Digest {
    Digest {
        stories: vec![DigestItem {
            headline: extract::PLACEHOLDER_HEADLINE.to_string(),
            summary: "No fresh stories could be retrieved from the configured sources.".to_string(),
            category: DEFAULT_CATEGORY.as_str().to_string(),
            link: String::new(),
        }],
    }
}
