// src/extract.rs
//! Resilient extraction of digest JSON from raw LLM text. LLM responses are
//! not guaranteed to be valid JSON even in JSON mode, so parsing runs
//! through a repair ladder and is total: every input produces a well-formed
//! [`Digest`], tagged with how much repair it took.

use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::category;

/// How the digest was recovered. `Parsed` is a clean parse, `Repaired` went
/// through textual fixups, `Emergency` was reassembled from regex fragments.
/// Callers use this to log and count degraded output instead of treating all
/// three the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fidelity {
    Parsed,
    Repaired,
    Emergency,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Digest {
    #[serde(default)]
    pub stories: Vec<DigestItem>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DigestItem {
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub link: String,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub digest: Digest,
    pub fidelity: Fidelity,
}

pub const PLACEHOLDER_HEADLINE: &str = "AI news digest unavailable";
pub const PLACEHOLDER_SUMMARY: &str = "Content could not be retrieved.";

/// Parse raw LLM output into a digest. Never fails.
///
/// Ladder: direct parse → brace-substring with URL-quote repair → generic
/// cleanups (trailing commas, bare keys, stray backslashes) → per-field
/// regex emergency extraction. The last rung always succeeds structurally.
pub fn extract_digest(raw: &str) -> Extraction {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        if let Some(digest) = shape(&value) {
            return Extraction {
                digest,
                fidelity: Fidelity::Parsed,
            };
        }
    }

    if let Some(candidate) = brace_substring(raw) {
        let fixed = fix_unclosed_url_quotes(&candidate);
        if let Some(digest) = parse_shaped(&fixed) {
            counter!("extract_repaired_total").increment(1);
            return Extraction {
                digest,
                fidelity: Fidelity::Repaired,
            };
        }

        let cleaned = generic_cleanup(&fixed);
        if let Some(digest) = parse_shaped(&cleaned) {
            counter!("extract_repaired_total").increment(1);
            return Extraction {
                digest,
                fidelity: Fidelity::Repaired,
            };
        }
    }

    counter!("extract_emergency_total").increment(1);
    tracing::warn!(
        input_len = raw.len(),
        "digest JSON unrecoverable, falling back to emergency extraction"
    );
    Extraction {
        digest: emergency_extract(raw),
        fidelity: Fidelity::Emergency,
    }
}

fn parse_shaped(candidate: &str) -> Option<Digest> {
    serde_json::from_str::<Value>(candidate)
        .ok()
        .and_then(|v| shape(&v))
}

/// Accept the shapes LLMs actually produce: the `{"stories": [...]}`
/// envelope, a bare story object, or a bare array of stories.
fn shape(value: &Value) -> Option<Digest> {
    match value {
        Value::Object(map) => {
            if let Some(Value::Array(arr)) = map.get("stories") {
                Some(Digest {
                    stories: arr.iter().filter_map(item_from_value).collect(),
                })
            } else if map.contains_key("headline") {
                item_from_value(value).map(|item| Digest {
                    stories: vec![item],
                })
            } else if map.is_empty() {
                Some(Digest::default())
            } else {
                None
            }
        }
        Value::Array(arr) => {
            let stories: Vec<_> = arr.iter().filter_map(item_from_value).collect();
            if stories.is_empty() {
                None
            } else {
                Some(Digest { stories })
            }
        }
        _ => None,
    }
}

fn item_from_value(value: &Value) -> Option<DigestItem> {
    let obj = value.as_object()?;
    let field = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Some(DigestItem {
        headline: field("headline"),
        summary: field("summary"),
        category: field("category"),
        link: field("link"),
    })
}

/// Substring between the first `{` and the last `}`, dropping prose or code
/// fences the model wrapped around the JSON.
fn brace_substring(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if start < end {
        Some(raw[start..=end].to_string())
    } else {
        None
    }
}

/// Close quoted URLs that lost their terminating quote before a `,`, `}` or
/// `]` (a frequent truncation artifact around long links).
fn fix_unclosed_url_quotes(s: &str) -> String {
    static RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#""(https?://[^"\s,}\]]+)(\s*[,}\]])"#).expect("url quote regex")
    });
    RE.replace_all(s, "\"${1}\"${2}").into_owned()
}

fn generic_cleanup(s: &str) -> String {
    static RE_TRAILING_COMMA: Lazy<Regex> =
        Lazy::new(|| Regex::new(r",\s*([}\]])").expect("trailing comma regex"));
    static RE_BARE_KEY: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:").expect("bare key regex"));
    static RE_STRAY_BACKSLASH: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"\\([^"\\/bfnrtu])"#).expect("backslash regex"));

    let out = RE_TRAILING_COMMA.replace_all(s, "${1}");
    let out = RE_BARE_KEY.replace_all(&out, "${1}\"${2}\":");
    RE_STRAY_BACKSLASH.replace_all(&out, "\\\\${1}").into_owned()
}

/// Last rung: pull whatever field fragments a loose per-field regex can
/// find and assemble a minimal valid digest. Categories missing or invalid
/// are resolved by the category classifier over the recovered text; if
/// nothing at all is recoverable a single placeholder story is produced so
/// downstream consumers always see one well-formed item.
fn emergency_extract(raw: &str) -> Digest {
    static RE_HEADLINE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#""?headline"?\s*:\s*"([^"]*)"#).expect("headline regex"));
    static RE_SUMMARY: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#""?summary"?\s*:\s*"([^"]*)"#).expect("summary regex"));
    static RE_CATEGORY: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#""?category"?\s*:\s*"([^"]*)"#).expect("category regex"));
    static RE_LINK: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#""?link"?\s*:\s*"(https?://[^"\s]*)"#).expect("link regex"));

    let grab = |re: &Regex| -> Vec<String> {
        re.captures_iter(raw)
            .map(|c| c[1].trim().to_string())
            .collect()
    };

    let headlines = grab(&RE_HEADLINE);
    let summaries = grab(&RE_SUMMARY);
    let categories = grab(&RE_CATEGORY);
    let links = grab(&RE_LINK);

    let count = headlines.len().max(summaries.len()).max(1);
    let mut stories = Vec::with_capacity(count);
    for i in 0..count {
        let headline = headlines
            .get(i)
            .filter(|h| !h.is_empty())
            .cloned()
            .unwrap_or_else(|| PLACEHOLDER_HEADLINE.to_string());
        let summary = summaries
            .get(i)
            .filter(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| PLACEHOLDER_SUMMARY.to_string());
        let recovered = format!("{headline} {summary}");
        let cat = category::classify(categories.get(i).map(String::as_str), &recovered);
        stories.push(DigestItem {
            headline,
            summary,
            category: cat.as_str().to_string(),
            link: links.get(i).cloned().unwrap_or_default(),
        });
    }
    Digest { stories }
}
