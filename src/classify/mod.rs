//! Data classification
//!
//! Field classification combines field-name heuristics with value
//! scans over a bounded sample; dataset classification aggregates field
//! results into an overall sensitivity and a compliance score.

pub mod dataset;
pub mod field;

pub use dataset::DatasetClassifier;
pub use field::FieldClassifier;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::{EntityType, Severity};
use crate::mask::MaskingRule;

/// Classification of a single named field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldClassification {
    pub field_name: String,

    /// Entity types attributed to this field, most confident first
    pub detected_types: Vec<EntityType>,

    /// Highest severity among detected types; absent when clean
    pub sensitivity: Option<Severity>,

    /// Confidence in the strongest attribution
    pub confidence: f64,

    /// Whether the field needs masking before export
    pub requires_masking: bool,

    /// Ready-to-use rules for this field's content
    pub suggested_rules: Vec<MaskingRule>,

    /// How many sample values were scanned
    pub samples_scanned: usize,
}

impl FieldClassification {
    /// A field with no detected sensitive content
    pub fn clean(field_name: &str, samples_scanned: usize) -> Self {
        Self {
            field_name: field_name.to_string(),
            detected_types: Vec::new(),
            sensitivity: None,
            confidence: 1.0,
            requires_masking: false,
            suggested_rules: Vec::new(),
            samples_scanned,
        }
    }
}

/// Classification of a whole dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetClassification {
    pub dataset_id: String,

    /// Per-field results, in input order
    pub fields: Vec<FieldClassification>,

    /// Highest field sensitivity; absent when every field is clean
    pub overall_sensitivity: Option<Severity>,

    /// Fields that require masking
    pub sensitive_field_count: usize,

    /// 0-100; deductions per field still requiring masking
    pub compliance_score: f64,

    pub recommendations: Vec<String>,

    pub classified_at: DateTime<Utc>,
}
