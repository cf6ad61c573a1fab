//! Dataset classification
//!
//! Aggregates field classifications into an overall sensitivity and a
//! 0-100 compliance score. Deductions are per field still requiring
//! masking: 15 for critical, 10 for high, 5 for medium.

use std::sync::Arc;
use tracing::info;

use super::field::FieldClassifier;
use super::{DatasetClassification, FieldClassification};
use crate::detect::{EntityDetector, Severity};

const CRITICAL_DEDUCTION: f64 = 15.0;
const HIGH_DEDUCTION: f64 = 10.0;
const MEDIUM_DEDUCTION: f64 = 5.0;

/// Export-readiness floor for the compliance score
const REVIEW_FLOOR: f64 = 70.0;

/// Classifies datasets field by field
pub struct DatasetClassifier {
    fields: FieldClassifier,
}

impl DatasetClassifier {
    pub fn new(detector: Arc<EntityDetector>, max_samples: usize) -> Self {
        Self {
            fields: FieldClassifier::new(detector, max_samples),
        }
    }

    /// The underlying field classifier
    pub fn field(&self) -> &FieldClassifier {
        &self.fields
    }

    /// Classify a dataset given `(field name, sample values)` pairs.
    /// Field order in the result follows input order.
    pub async fn classify(
        &self,
        dataset_id: &str,
        fields: &[(String, Vec<String>)],
    ) -> DatasetClassification {
        let mut results: Vec<FieldClassification> = Vec::with_capacity(fields.len());
        for (name, samples) in fields {
            results.push(self.fields.classify(name, samples).await);
        }

        let overall_sensitivity = results.iter().filter_map(|f| f.sensitivity).max();
        let sensitive: Vec<&FieldClassification> =
            results.iter().filter(|f| f.requires_masking).collect();

        let mut score = 100.0;
        for field in &sensitive {
            score -= match field.sensitivity {
                Some(Severity::Critical) => CRITICAL_DEDUCTION,
                Some(Severity::High) => HIGH_DEDUCTION,
                _ => MEDIUM_DEDUCTION,
            };
        }
        let compliance_score = score.max(0.0);

        let mut recommendations = Vec::new();
        if !sensitive.is_empty() {
            recommendations.push(format!(
                "{} of {} fields require masking before export",
                sensitive.len(),
                results.len()
            ));
        }
        for field in &sensitive {
            if field.sensitivity == Some(Severity::Critical) {
                let types: Vec<String> =
                    field.detected_types.iter().map(|t| t.label()).collect();
                recommendations.push(format!(
                    "field '{}' holds {}, apply the suggested redaction rules",
                    field.field_name,
                    types.join(", ")
                ));
            }
        }
        if compliance_score < REVIEW_FLOOR {
            recommendations.push(
                "compliance score below review floor, dataset is not export-ready".to_string(),
            );
        }

        let sensitive_field_count = sensitive.len();
        info!(
            dataset = dataset_id,
            fields = results.len(),
            sensitive = sensitive_field_count,
            score = compliance_score,
            "dataset classified"
        );
        DatasetClassification {
            dataset_id: dataset_id.to_string(),
            fields: results,
            overall_sensitivity,
            sensitive_field_count,
            compliance_score,
            recommendations,
            classified_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{PatternCatalog, ScanCache};

    fn classifier() -> DatasetClassifier {
        let detector = Arc::new(EntityDetector::new(
            Arc::new(PatternCatalog::builtin()),
            Arc::new(ScanCache::new(64)),
            0.5,
        ));
        DatasetClassifier::new(detector, 10)
    }

    fn field(name: &str, values: &[&str]) -> (String, Vec<String>) {
        (
            name.to_string(),
            values.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn test_clean_dataset_scores_full_marks() {
        let c = classifier();
        let result = c
            .classify(
                "orders",
                &[field("quantity", &["1", "2"]), field("status", &["open"])],
            )
            .await;
        assert_eq!(result.compliance_score, 100.0);
        assert!(result.overall_sensitivity.is_none());
        assert_eq!(result.sensitive_field_count, 0);
        assert!(result.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_mixed_dataset_deducts_per_sensitive_field() {
        let c = classifier();
        let result = c
            .classify(
                "customers",
                &[
                    field("email", &["a@b.example"]),
                    field("card_number", &["4111 1111 1111 1111"]),
                    field("note", &["plain text"]),
                ],
            )
            .await;
        // One high (-10) and one critical (-15) field
        assert_eq!(result.compliance_score, 75.0);
        assert_eq!(result.sensitive_field_count, 2);
        assert_eq!(result.overall_sensitivity, Some(Severity::Critical));
        assert!(result
            .recommendations
            .iter()
            .any(|r| r.contains("card_number")));
    }

    #[tokio::test]
    async fn test_low_score_flags_export_readiness() {
        let c = classifier();
        let result = c
            .classify(
                "breach",
                &[
                    field("ssn", &["123-45-6789"]),
                    field("card", &["4111 1111 1111 1111"]),
                    field("password", &["password = hunter2s"]),
                ],
            )
            .await;
        assert!(result.compliance_score < REVIEW_FLOOR);
        assert!(result
            .recommendations
            .iter()
            .any(|r| r.contains("not export-ready")));
    }

    #[tokio::test]
    async fn test_field_order_preserved() {
        let c = classifier();
        let result = c
            .classify("t", &[field("b", &[]), field("a", &[])])
            .await;
        let names: Vec<&str> = result.fields.iter().map(|f| f.field_name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
