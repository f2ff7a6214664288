// src/category.rs
//! Keyword-lexicon category classifier. Scores free text against a fixed
//! closed set of categories; deterministic, no I/O.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Closed category set used by the digest and the document sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    ModelUpdate,
    Research,
    Market,
    DevTools,
}

/// Declaration order doubles as the tie-break order: the first category to
/// reach the top score wins.
pub const ALL_CATEGORIES: [Category; 4] = [
    Category::ModelUpdate,
    Category::Research,
    Category::Market,
    Category::DevTools,
];

/// Returned when no lexicon keyword matches at all.
pub const DEFAULT_CATEGORY: Category = Category::Research;

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::ModelUpdate => "Model Update",
            Category::Research => "Research",
            Category::Market => "Market",
            Category::DevTools => "Developer Tools",
        }
    }

    /// Korean display label, used by the document sink.
    pub fn label_ko(self) -> &'static str {
        match self {
            Category::ModelUpdate => "모델 업데이트",
            Category::Research => "연구 동향",
            Category::Market => "시장 동향",
            Category::DevTools => "개발자 도구",
        }
    }

    /// Accepts either display label, case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        let t = label.trim();
        ALL_CATEGORIES
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(t) || c.label_ko() == t)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword lexicons, English and Korean terms mixed. Patterns run against
/// lowercased text; short tokens carry word boundaries so "api" does not
/// fire inside "rapid".
const LEXICONS: [(Category, &[&str]); 4] = [
    (
        Category::ModelUpdate,
        &[
            r"new model",
            r"\bmodel\b",
            r"\brelease",
            r"\blaunch",
            r"fine-?tun",
            r"context length",
            r"context window",
            r"multimodal",
            r"\bparameters?\b",
            r"open weights?",
            r"inference speed",
            r"new version",
            r"새로운 모델",
            r"성능 향상",
            r"파인튜닝",
            r"멀티모달",
        ],
    ),
    (
        Category::Research,
        &[
            r"\bpaper\b",
            r"\bresearch\b",
            r"\bstudy\b",
            r"benchmark",
            r"dataset",
            r"algorithm",
            r"experiment",
            r"\bmethod\b",
            r"arxiv",
            r"state[- ]of[- ]the[- ]art",
            r"논문",
            r"연구",
            r"벤치마크",
            r"데이터셋",
        ],
    ),
    (
        Category::Market,
        &[
            r"funding",
            r"investment",
            r"acquisition",
            r"\bmerger\b",
            r"valuation",
            r"revenue",
            r"\bstartup\b",
            r"\bipo\b",
            r"market share",
            r"series [a-e]\b",
            r"투자",
            r"인수",
            r"합병",
            r"시장 점유율",
        ],
    ),
    (
        Category::DevTools,
        &[
            r"\bsdk\b",
            r"\bapi\b",
            r"toolkit",
            r"framework",
            r"\blibrary\b",
            r"\bplugin\b",
            r"open[- ]source",
            r"github",
            r"\bcli\b",
            r"developer",
            r"개발자",
            r"프레임워크",
            r"라이브러리",
            r"오픈소스",
        ],
    ),
];

static COMPILED: Lazy<Vec<(Category, Vec<Regex>)>> = Lazy::new(|| {
    LEXICONS
        .iter()
        .map(|(cat, patterns)| {
            let regexes = patterns
                .iter()
                .map(|p| Regex::new(p).expect("category lexicon pattern"))
                .collect();
            (*cat, regexes)
        })
        .collect()
});

/// Classify text into a category. An `existing` label that is already a
/// member of the valid set passes through unchanged; otherwise keyword hits
/// are counted and the best-scoring category wins, ties broken by
/// declaration order, zero hits falling back to [`DEFAULT_CATEGORY`].
pub fn classify(existing: Option<&str>, text: &str) -> Category {
    if let Some(label) = existing {
        if let Some(cat) = Category::from_label(label) {
            return cat;
        }
    }

    let lower = text.to_lowercase();
    let mut best = DEFAULT_CATEGORY;
    let mut best_score = 0usize;
    for (cat, regexes) in COMPILED.iter() {
        let score: usize = regexes.iter().map(|re| re.find_iter(&lower).count()).sum();
        if score > best_score {
            best = *cat;
            best_score = score;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_existing_label_passes_through() {
        assert_eq!(classify(Some("Market"), "new model release"), Category::Market);
        assert_eq!(
            classify(Some("모델 업데이트"), "funding acquisition"),
            Category::ModelUpdate
        );
        assert_eq!(classify(Some("market"), ""), Category::Market);
    }

    #[test]
    fn invalid_existing_label_is_reclassified() {
        assert_eq!(
            classify(Some("Sports"), "a new paper with benchmark results"),
            Category::Research
        );
    }

    #[test]
    fn model_and_release_text_wins_model_update() {
        let text = "X launches model: the new release improves context length";
        assert_eq!(classify(None, text), Category::ModelUpdate);
    }

    #[test]
    fn zero_hits_fall_back_to_default() {
        assert_eq!(classify(None, "nothing relevant here"), DEFAULT_CATEGORY);
        assert_eq!(classify(None, ""), DEFAULT_CATEGORY);
    }

    #[test]
    fn classification_is_deterministic() {
        let text = "open-source SDK with a new API and a github repo";
        let a = classify(None, text);
        let b = classify(None, text);
        assert_eq!(a, b);
        assert_eq!(a, Category::DevTools);
    }

    #[test]
    fn korean_keywords_score() {
        assert_eq!(classify(None, "대규모 투자와 인수 합병 소식"), Category::Market);
    }

    #[test]
    fn word_boundaries_guard_short_tokens() {
        // "rapid" must not count as "api".
        assert_eq!(classify(None, "rapid growth of nothing"), DEFAULT_CATEGORY);
    }
}
