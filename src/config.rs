// src/config.rs
//! Application configuration surface. Everything here is externally
//! supplied and read-only to the core: source list, freshness windows,
//! throttle bounds, retry caps, LLM and sink settings. Secrets (API keys,
//! webhook URLs) come from the environment, never from the config file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::SourceConfig;
use crate::ingest::{CollectOptions, Throttle};

const ENV_PATH: &str = "NEWS_CONFIG_PATH";

const DEFAULT_MAX_ITEMS: usize = 3;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sources: Vec<SourceConfig>,
    /// Default freshness window (hours), applied to sources that do not set
    /// their own `timeframe_hours`.
    pub freshness_hours: i64,
    /// Hard ceiling for the most-recent-item fallback, independent of the
    /// freshness window.
    pub fallback_ceiling_hours: i64,
    pub dedup_by_domain: bool,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub max_retries: u32,
    pub target_language: String,
    pub llm: LlmSettings,
    pub scraper_endpoint: Option<String>,
    pub doc_api: Option<DocApiSettings>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            freshness_hours: 24,
            fallback_ceiling_hours: 24,
            dedup_by_domain: true,
            delay_min_ms: 2_000,
            delay_max_ms: 5_000,
            max_retries: 3,
            target_language: "Korean".to_string(),
            llm: LlmSettings::default(),
            scraper_endpoint: None,
            doc_api: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocApiSettings {
    pub base_url: String,
    pub database_id: String,
}

impl AppConfig {
    /// Fill per-source defaults and reject invalid shapes. Shape errors are
    /// programmer errors and the only errors this crate lets propagate.
    pub fn validated(mut self) -> Result<Self> {
        if self.freshness_hours < 1 {
            bail!("freshness_hours must be >= 1");
        }
        if self.fallback_ceiling_hours < 1 {
            bail!("fallback_ceiling_hours must be >= 1");
        }
        for source in &mut self.sources {
            if source.identifier.trim().is_empty() {
                bail!("source with empty identifier");
            }
            if source.max_items == 0 {
                source.max_items = DEFAULT_MAX_ITEMS;
            }
            if source.timeframe_hours <= 0 {
                source.timeframe_hours = self.freshness_hours;
            }
        }
        Ok(self)
    }

    pub fn throttle(&self) -> Throttle {
        Throttle::new(self.delay_min_ms, self.delay_max_ms)
    }

    pub fn collect_options(&self) -> CollectOptions {
        CollectOptions {
            llm_provider: self.llm.provider.clone(),
            fallback_ceiling_hours: self.fallback_ceiling_hours,
            dedup_by_domain: self.dedup_by_domain,
            throttle: self.throttle(),
        }
    }
}

/// Load config using env var + fallbacks:
/// 1) $NEWS_CONFIG_PATH
/// 2) config/news.toml
/// 3) config/news.json
/// 4) built-in defaults
pub fn load_default() -> Result<AppConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        bail!("NEWS_CONFIG_PATH points to non-existent path");
    }
    let toml_p = PathBuf::from("config/news.toml");
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from("config/news.json");
    if json_p.exists() {
        return load_from(&json_p);
    }
    AppConfig::default().validated()
}

pub fn load_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg: AppConfig = match ext.as_str() {
        "json" => serde_json::from_str(&content).context("parsing json config")?,
        _ => toml::from_str(&content).context("parsing toml config")?,
    };
    cfg.validated()
}
