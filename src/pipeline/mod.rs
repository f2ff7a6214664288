// src/pipeline/mod.rs
//! Batch text pipeline: per-item translation, brief summarization and
//! bullet-point summarization over the same cache-partitioned, concurrent,
//! order-preserving shape. A failing item degrades to a fallback value and
//! never fails its batch.

pub mod llm;

use std::sync::Arc;

use futures::future::join_all;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::cache::{cache_key, TtlCache};
use crate::pipeline::llm::{ChatMessage, CompletionRequest, LlmClient};

/// Input caps per stage, in characters. Longer content is truncated before
/// the call, never rejected.
pub const TRANSLATE_INPUT_MAX_CHARS: usize = 12_000;
pub const SUMMARIZE_INPUT_MAX_CHARS: usize = 8_000;
pub const BULLETIZE_INPUT_MAX_CHARS: usize = 6_000;

/// Stage results are memoized for a day; a rerun within that window reuses
/// them instead of re-paying the LLM.
pub const STAGE_CACHE_TTL_MS: u64 = 24 * 60 * 60 * 1000;

pub const FALLBACK_SUMMARY: &str = "Summary unavailable.";
pub const FALLBACK_BULLETS: &str = "- (no summary available)";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_cache_hits_total", "Stage results served from cache.");
        describe_counter!("pipeline_cache_misses_total", "Stage results computed via LLM.");
        describe_counter!(
            "pipeline_stage_failures_total",
            "Per-item stage failures degraded to fallback text."
        );
    });
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Translate,
    Summarize,
    Bulletize,
}

impl Stage {
    fn namespace(self) -> &'static str {
        match self {
            Stage::Translate => "translate",
            Stage::Summarize => "summarize",
            Stage::Bulletize => "bulletize",
        }
    }

    fn max_chars(self) -> usize {
        match self {
            Stage::Translate => TRANSLATE_INPUT_MAX_CHARS,
            Stage::Summarize => SUMMARIZE_INPUT_MAX_CHARS,
            Stage::Bulletize => BULLETIZE_INPUT_MAX_CHARS,
        }
    }

    fn max_tokens(self) -> u32 {
        match self {
            Stage::Translate => 2_000,
            Stage::Summarize => 400,
            Stage::Bulletize => 400,
        }
    }

    fn messages(self, target_language: &str, text: &str) -> Vec<ChatMessage> {
        let system = match self {
            Stage::Translate => format!(
                "You are a professional translator. Translate the user's text into {target_language}, \
                 keeping technical terms and product names as-is. Output only the translation."
            ),
            Stage::Summarize => format!(
                "Summarize the user's article in 2-3 sentences in {target_language}. \
                 Neutral tone. Output only the summary."
            ),
            Stage::Bulletize => format!(
                "Rewrite the user's text as 3-5 concise bullet points in {target_language}, \
                 one per line, each starting with '- '. Output only the bullets."
            ),
        };
        vec![ChatMessage::system(system), ChatMessage::user(text)]
    }

    /// Per-item degradation when the LLM fails or the item has no content.
    fn fallback(self, original: &str) -> String {
        match self {
            Stage::Translate => original.to_string(),
            Stage::Summarize => FALLBACK_SUMMARY.to_string(),
            Stage::Bulletize => FALLBACK_BULLETS.to_string(),
        }
    }
}

pub struct TextPipeline {
    llm: Arc<dyn LlmClient>,
    cache: Arc<TtlCache<String>>,
    target_language: String,
}

impl TextPipeline {
    pub fn new(llm: Arc<dyn LlmClient>, cache: Arc<TtlCache<String>>, target_language: impl Into<String>) -> Self {
        ensure_metrics_described();
        Self {
            llm,
            cache,
            target_language: target_language.into(),
        }
    }

    pub async fn translate_batch(&self, inputs: &[String]) -> Vec<String> {
        self.run_stage(Stage::Translate, inputs).await
    }

    pub async fn summarize_batch(&self, inputs: &[String]) -> Vec<String> {
        self.run_stage(Stage::Summarize, inputs).await
    }

    pub async fn bulletize_batch(&self, inputs: &[String]) -> Vec<String> {
        self.run_stage(Stage::Bulletize, inputs).await
    }

    /// Shared batch shape: resolve cached items synchronously, dispatch the
    /// rest concurrently, merge back in original input order.
    async fn run_stage(&self, stage: Stage, inputs: &[String]) -> Vec<String> {
        let mut out: Vec<Option<String>> = vec![None; inputs.len()];
        let mut pending: Vec<(usize, String, String)> = Vec::new();

        for (i, input) in inputs.iter().enumerate() {
            let trimmed = input.trim();
            if trimmed.is_empty() {
                out[i] = Some(stage.fallback(input));
                continue;
            }
            let capped = truncate_chars(trimmed, stage.max_chars());
            let key = cache_key(
                stage.namespace(),
                &format!(
                    "{}\u{1f}{}\u{1f}{}",
                    self.llm.name(),
                    self.target_language,
                    capped
                ),
            );
            if let Some(hit) = self.cache.get(&key) {
                counter!("pipeline_cache_hits_total").increment(1);
                out[i] = Some(hit);
            } else {
                counter!("pipeline_cache_misses_total").increment(1);
                pending.push((i, capped, key));
            }
        }

        let results = join_all(pending.iter().map(|(_, capped, _)| {
            let req = CompletionRequest {
                messages: stage.messages(&self.target_language, capped),
                temperature: 0.3,
                max_tokens: stage.max_tokens(),
                json_mode: false,
            };
            self.llm.complete(req)
        }))
        .await;

        for ((i, _, key), result) in pending.into_iter().zip(results) {
            let value = match result {
                Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
                Ok(_) => {
                    tracing::warn!(stage = stage.namespace(), index = i, "stage returned empty text");
                    None
                }
                Err(e) => {
                    tracing::warn!(error = ?e, stage = stage.namespace(), index = i, "stage item failed");
                    None
                }
            };
            match value {
                Some(text) => {
                    self.cache.set(&key, text.clone(), STAGE_CACHE_TTL_MS);
                    out[i] = Some(text);
                }
                None => {
                    counter!("pipeline_stage_failures_total").increment(1);
                    out[i] = Some(stage.fallback(&inputs[i]));
                }
            }
        }

        out.into_iter().map(Option::unwrap_or_default).collect()
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::{EchoLlm, MockLlm};

    fn inputs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn output_preserves_input_order() {
        let llm = Arc::new(EchoLlm::new("KO:"));
        let cache = Arc::new(TtlCache::new());
        let pipeline = TextPipeline::new(llm, cache, "Korean");
        let out = pipeline
            .translate_batch(&inputs(&["alpha", "beta", "gamma"]))
            .await;
        assert_eq!(out, vec!["KO:alpha", "KO:beta", "KO:gamma"]);
    }

    #[tokio::test]
    async fn cached_items_skip_the_llm() {
        let llm = Arc::new(EchoLlm::new("KO:"));
        let cache = Arc::new(TtlCache::new());
        let pipeline = TextPipeline::new(llm.clone(), cache, "Korean");
        let batch = inputs(&["alpha", "beta"]);
        pipeline.translate_batch(&batch).await;
        assert_eq!(llm.calls(), 2);
        let out = pipeline.translate_batch(&batch).await;
        assert_eq!(llm.calls(), 2);
        assert_eq!(out, vec!["KO:alpha", "KO:beta"]);
    }

    #[tokio::test]
    async fn stages_do_not_share_cache_entries() {
        let llm = Arc::new(EchoLlm::new("X:"));
        let cache = Arc::new(TtlCache::new());
        let pipeline = TextPipeline::new(llm.clone(), cache, "Korean");
        let batch = inputs(&["alpha"]);
        pipeline.translate_batch(&batch).await;
        pipeline.summarize_batch(&batch).await;
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn failed_item_degrades_without_failing_batch() {
        let llm = Arc::new(MockLlm::new());
        llm.push_err("rate limited");
        let cache = Arc::new(TtlCache::new());
        let pipeline = TextPipeline::new(llm, cache, "Korean");
        let out = pipeline.summarize_batch(&inputs(&["some article"])).await;
        assert_eq!(out, vec![FALLBACK_SUMMARY.to_string()]);
    }

    #[tokio::test]
    async fn empty_input_short_circuits_to_fallback() {
        let llm = Arc::new(EchoLlm::new("KO:"));
        let cache = Arc::new(TtlCache::new());
        let pipeline = TextPipeline::new(llm.clone(), cache, "Korean");
        let out = pipeline.translate_batch(&inputs(&["", "  ", "real"])).await;
        assert_eq!(out, vec!["".to_string(), "  ".to_string(), "KO:real".to_string()]);
        assert_eq!(llm.calls(), 1);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "가나다라마";
        assert_eq!(truncate_chars(s, 3), "가나다");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
