//! Deep analysis pass
//!
//! A second detection stage that sees the pattern findings and the full
//! text. Implementations can add findings the regex pass cannot express
//! and refine the confidence of existing ones. Analyzer failures are
//! isolated by the detector; pattern findings always survive.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{DetectionMethod, EntitySpan, EntityType};
use crate::error::Result;

/// Second-stage analyzer behind the pattern pass
#[async_trait]
pub trait DeepAnalyzer: Send + Sync {
    /// Analyzer name, used in logs
    fn name(&self) -> &str;

    /// Refine `findings` against `text` and return the full finding set.
    /// The returned vector replaces `findings` on success.
    async fn analyze(&self, text: &str, findings: Vec<EntitySpan>) -> Result<Vec<EntitySpan>>;
}

/// Keyword window size, in bytes, examined on each side of a finding
const CONTEXT_WINDOW: usize = 40;

const CONFIDENCE_BOOST: f64 = 0.05;
const DECOY_PENALTY: f64 = 0.30;

static HONORIFIC_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:Mr|Mrs|Ms|Dr|Prof)\.\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?").unwrap()
});

/// Words near a finding that reinforce it
const SUPPORTING_KEYWORDS: &[&str] = &[
    "email", "e-mail", "phone", "mobile", "tel", "card", "credit", "ssn", "social", "account",
    "iban", "key", "token", "secret", "password", "contact",
];

/// Words near a finding that suggest synthetic or documentation data
const DECOY_KEYWORDS: &[&str] = &["example", "sample", "test", "dummy", "fake", "placeholder"];

/// Heuristic analyzer: context-keyword confidence adjustment plus
/// honorific-prefixed person names.
#[derive(Default)]
pub struct ContextAnalyzer;

impl ContextAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn context_window<'a>(text: &'a str, span: &EntitySpan) -> &'a str {
        let mut start = span.start.saturating_sub(CONTEXT_WINDOW);
        while start > 0 && !text.is_char_boundary(start) {
            start -= 1;
        }
        let mut end = (span.end + CONTEXT_WINDOW).min(text.len());
        while end < text.len() && !text.is_char_boundary(end) {
            end += 1;
        }
        &text[start..end]
    }

    fn adjust_confidence(text: &str, span: &EntitySpan) -> f64 {
        let window = Self::context_window(text, span).to_lowercase();
        let mut confidence = span.confidence;
        for keyword in SUPPORTING_KEYWORDS {
            if window.contains(keyword) {
                confidence += CONFIDENCE_BOOST;
                break;
            }
        }
        for keyword in DECOY_KEYWORDS {
            if window.contains(keyword) {
                confidence -= DECOY_PENALTY;
                break;
            }
        }
        confidence.clamp(0.0, 1.0)
    }
}

#[async_trait]
impl DeepAnalyzer for ContextAnalyzer {
    fn name(&self) -> &str {
        "context"
    }

    async fn analyze(&self, text: &str, findings: Vec<EntitySpan>) -> Result<Vec<EntitySpan>> {
        let mut refined: Vec<EntitySpan> = findings
            .into_iter()
            .map(|mut span| {
                span.confidence = Self::adjust_confidence(text, &span);
                span
            })
            .collect();

        for m in HONORIFIC_NAME.find_iter(text) {
            refined.push(EntitySpan {
                entity_type: EntityType::PersonName,
                start: m.start(),
                end: m.end(),
                matched_text: m.as_str().to_string(),
                confidence: 0.70,
                method: DetectionMethod::DeepAnalysis,
                pattern_id: None,
                metadata: std::collections::HashMap::new(),
            });
        }

        Ok(refined)
    }
}
