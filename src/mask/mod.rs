//! Rule-driven masking
//!
//! Masking is split into three layers: strategies (pure text
//! transforms), rules (which strategy applies to which entity type and
//! when), and the anonymizer (applies resolved rules to detected spans
//! by descending start offset so earlier offsets never shift).

pub mod anonymizer;
pub mod rules;
pub mod strategy;

pub use anonymizer::RuleAnonymizer;
pub use rules::MaskingRule;
pub use strategy::MaskStrategy;

use serde::{Deserialize, Serialize};

use crate::detect::EntitySpan;

/// Outcome of one anonymization pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymizationResult {
    /// True when the pass recorded no per-entity errors
    pub success: bool,

    /// Input text as received
    pub original_text: String,

    /// Text with every applicable rule applied
    pub anonymized_text: String,

    /// Findings handled by a rule
    pub entities_masked: usize,

    /// Findings left untouched (no rule, rule disabled, or below the
    /// rule's confidence threshold)
    pub entities_skipped: usize,

    /// Ids of the rules that fired, sorted and deduplicated
    pub rules_applied: Vec<String>,

    /// The findings the pass operated on
    pub entities: Vec<EntitySpan>,

    /// Per-entity soft failures; the pass still succeeds
    pub errors: Vec<String>,

    /// Wall-clock duration of the pass
    pub processing_time_ms: u64,
}
