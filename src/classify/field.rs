//! Field classification
//!
//! Two signals per field: what the field is *called* and what its
//! values *contain*. Name heuristics contribute a fixed 0.6 confidence;
//! a value scan attributing the same type overrides that with its own
//! confidence, so evidence from real values always wins.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::FieldClassification;
use crate::detect::{EntityDetector, EntityType, Severity};
use crate::mask::{MaskStrategy, MaskingRule};

/// Confidence assigned to a name-only attribution
const NAME_HEURISTIC_CONFIDENCE: f64 = 0.6;

/// requires_masking confidence floors, by severity
const CRITICAL_FLOOR: f64 = 0.3;
const HIGH_FLOOR: f64 = 0.5;
const MEDIUM_FLOOR: f64 = 0.7;

static NAME_HINTS: Lazy<Vec<(Regex, EntityType)>> = Lazy::new(|| {
    [
        (r"e[-_]?mail", EntityType::Email),
        (r"phone|mobile|telephone|\btel\b", EntityType::Phone),
        (r"ssn|social[-_]?sec|national[-_]?id", EntityType::NationalId),
        (r"card[-_]?(number|num)|\bpan\b|cc[-_]?num", EntityType::CreditCard),
        (r"pass(word)?|passwd|pwd", EntityType::Password),
        (r"api[-_]?key|token|secret", EntityType::ApiKey),
        (r"ip[-_]?addr", EntityType::IpAddress),
        (r"mac[-_]?addr", EntityType::MacAddress),
        (r"iban|account[-_]?(number|num)", EntityType::Iban),
        (r"dob|birth", EntityType::DateOfBirth),
        (
            r"(first|last|full|middle|user)[-_]?name|surname",
            EntityType::PersonName,
        ),
        (r"url|website|homepage", EntityType::Url),
    ]
    .into_iter()
    .map(|(pattern, entity_type)| (Regex::new(pattern).unwrap(), entity_type))
    .collect()
});

/// Classifies one field from its name and sample values
pub struct FieldClassifier {
    detector: Arc<EntityDetector>,
    max_samples: usize,
}

impl FieldClassifier {
    pub fn new(detector: Arc<EntityDetector>, max_samples: usize) -> Self {
        Self {
            detector,
            max_samples: max_samples.max(1),
        }
    }

    /// Classify `field_name` from up to `max_samples` of `samples`.
    pub async fn classify(&self, field_name: &str, samples: &[String]) -> FieldClassification {
        // type -> (confidence, backed by value evidence)
        let mut attributions: HashMap<EntityType, f64> = HashMap::new();

        let scanned = samples.len().min(self.max_samples);
        for sample in samples.iter().take(scanned) {
            for span in self.detector.detect(sample).await {
                let entry = attributions.entry(span.entity_type).or_insert(0.0);
                if span.confidence > *entry {
                    *entry = span.confidence;
                }
            }
        }

        let lowered = field_name.to_lowercase();
        for (hint, entity_type) in NAME_HINTS.iter() {
            if hint.is_match(&lowered) && !attributions.contains_key(entity_type) {
                attributions.insert(entity_type.clone(), NAME_HEURISTIC_CONFIDENCE);
            }
        }

        if attributions.is_empty() {
            return FieldClassification::clean(field_name, scanned);
        }

        let mut detected: Vec<(EntityType, f64)> = attributions.into_iter().collect();
        detected.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.label().cmp(&b.0.label()))
        });

        let sensitivity = detected
            .iter()
            .map(|(t, _)| t.severity())
            .max()
            .unwrap_or(Severity::Low);
        let confidence = detected.first().map(|(_, c)| *c).unwrap_or(0.0);
        let requires_masking = match sensitivity {
            Severity::Critical => confidence >= CRITICAL_FLOOR,
            Severity::High => confidence >= HIGH_FLOOR,
            Severity::Medium => confidence >= MEDIUM_FLOOR,
            Severity::Low => false,
        };

        let suggested_rules = if requires_masking {
            suggest_rules(field_name, &detected)
        } else {
            Vec::new()
        };

        debug!(field = field_name, types = detected.len(), "field classified");
        FieldClassification {
            field_name: field_name.to_string(),
            detected_types: detected.into_iter().map(|(t, _)| t).collect(),
            sensitivity: Some(sensitivity),
            confidence,
            requires_masking,
            suggested_rules,
            samples_scanned: scanned,
        }
    }
}

/// Default strategy per severity: redact critical, hash high, mask
/// medium, keep low.
fn suggest_rules(field_name: &str, detected: &[(EntityType, f64)]) -> Vec<MaskingRule> {
    detected
        .iter()
        .filter_map(|(entity_type, _)| {
            let strategy = match entity_type.severity() {
                Severity::Critical => MaskStrategy::Redact,
                Severity::High => MaskStrategy::Hash {
                    salt: field_name.to_string(),
                    keep: 16,
                },
                Severity::Medium => MaskStrategy::Mask {
                    mask_char: '*',
                    count: None,
                    from_end: false,
                },
                Severity::Low => MaskStrategy::Keep,
            };
            let id = format!(
                "{}_{}",
                field_name.to_lowercase(),
                entity_type.label().to_lowercase()
            );
            let mut rule = MaskingRule::for_type(&id, entity_type.clone(), strategy).ok()?;
            rule.field_pattern = Some(format!("^{}$", regex::escape(field_name)));
            Some(rule)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{PatternCatalog, ScanCache};

    fn classifier() -> FieldClassifier {
        let detector = Arc::new(EntityDetector::new(
            Arc::new(PatternCatalog::builtin()),
            Arc::new(ScanCache::new(64)),
            0.5,
        ));
        FieldClassifier::new(detector, 10)
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_value_evidence_drives_classification() {
        let c = classifier();
        let result = c
            .classify("contact", &strings(&["a@b.example", "c@d.example"]))
            .await;
        assert_eq!(result.detected_types, vec![EntityType::Email]);
        assert_eq!(result.sensitivity, Some(Severity::High));
        assert!(result.requires_masking);
        assert!(result.confidence > 0.6);
    }

    #[tokio::test]
    async fn test_name_heuristic_fires_without_values() {
        let c = classifier();
        let result = c.classify("user_email", &[]).await;
        assert_eq!(result.detected_types, vec![EntityType::Email]);
        assert!((result.confidence - 0.6).abs() < f64::EPSILON);
        assert!(result.requires_masking);
    }

    #[tokio::test]
    async fn test_value_confidence_overrides_name_heuristic() {
        let c = classifier();
        let result = c
            .classify("user_email", &strings(&["x@y.example"]))
            .await;
        assert_eq!(result.detected_types, vec![EntityType::Email]);
        assert!(result.confidence > 0.6);
    }

    #[tokio::test]
    async fn test_clean_field() {
        let c = classifier();
        let result = c.classify("quantity", &strings(&["12", "40", "7"])).await;
        assert!(result.detected_types.is_empty());
        assert!(result.sensitivity.is_none());
        assert!(!result.requires_masking);
        assert_eq!(result.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_sample_cap_respected() {
        let detector = Arc::new(EntityDetector::new(
            Arc::new(PatternCatalog::builtin()),
            Arc::new(ScanCache::new(64)),
            0.5,
        ));
        let c = FieldClassifier::new(detector, 2);
        let samples = strings(&["1", "2", "3", "4", "5"]);
        let result = c.classify("count", &samples).await;
        assert_eq!(result.samples_scanned, 2);
    }

    #[tokio::test]
    async fn test_suggested_rules_are_valid_and_field_scoped() {
        let c = classifier();
        let result = c
            .classify("card_number", &strings(&["4111 1111 1111 1111"]))
            .await;
        assert!(result.requires_masking);
        assert!(!result.suggested_rules.is_empty());
        for rule in &result.suggested_rules {
            assert!(rule.validate().is_ok());
            assert!(rule.applies_to_field(Some("card_number")));
            assert!(!rule.applies_to_field(Some("other_field")));
        }
        assert_eq!(
            result.suggested_rules[0].strategy,
            MaskStrategy::Redact
        );
    }

    #[tokio::test]
    async fn test_medium_severity_needs_stronger_confidence() {
        let c = classifier();
        // Name-only person name attribution at 0.6 stays unmasked
        let result = c.classify("last_name", &[]).await;
        assert_eq!(result.detected_types, vec![EntityType::PersonName]);
        assert!(!result.requires_masking);
    }
}
