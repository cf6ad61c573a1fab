//! Entity detector
//!
//! Runs the pattern catalog through the scan cache, hands the findings
//! to the deep analyzer when one is attached, and merges the result.
//! Same-type overlapping findings collapse to the highest confidence.

use std::sync::Arc;
use tracing::{debug, warn};

use super::analyzer::DeepAnalyzer;
use super::cache::ScanCache;
use super::patterns::PatternCatalog;
use super::{DetectionMethod, EntitySpan, EntityType};

/// Pattern + deep-analysis detection over a single payload
pub struct EntityDetector {
    catalog: Arc<PatternCatalog>,
    cache: Arc<ScanCache>,
    analyzer: Option<Arc<dyn DeepAnalyzer>>,
    min_confidence: f64,
}

impl EntityDetector {
    pub fn new(catalog: Arc<PatternCatalog>, cache: Arc<ScanCache>, min_confidence: f64) -> Self {
        Self {
            catalog,
            cache,
            analyzer: None,
            min_confidence,
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn DeepAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &ScanCache {
        &self.cache
    }

    /// Detect entities in `text` with the configured defaults.
    ///
    /// Never fails: an analyzer error is logged and the pattern findings
    /// are returned on their own.
    pub async fn detect(&self, text: &str) -> Vec<EntitySpan> {
        self.detect_filtered(text, None, None).await
    }

    /// Detect with an optional entity-type allowlist and confidence floor.
    pub async fn detect_filtered(
        &self,
        text: &str,
        types: Option<&[EntityType]>,
        min_confidence: Option<f64>,
    ) -> Vec<EntitySpan> {
        if text.is_empty() {
            return Vec::new();
        }

        let floor = min_confidence.unwrap_or(self.min_confidence);
        let findings = self.pattern_scan(text, types);

        let findings = match &self.analyzer {
            Some(analyzer) => match analyzer.analyze(text, findings.clone()).await {
                Ok(refined) => refined,
                Err(e) => {
                    warn!(analyzer = analyzer.name(), error = %e,
                          "deep analysis failed, keeping pattern findings");
                    findings
                }
            },
            None => findings,
        };

        let mut merged = merge_overlaps(findings);
        merged.retain(|span| {
            span.confidence >= floor && type_allowed(&span.entity_type, types)
        });
        merged.sort_by_key(|span| (span.start, span.end));
        debug!(count = merged.len(), bytes = text.len(), "detection complete");
        merged
    }

    fn pattern_scan(&self, text: &str, types: Option<&[EntityType]>) -> Vec<EntitySpan> {
        let digest = ScanCache::digest(text);
        let mut findings = Vec::new();
        for pattern in self.catalog.patterns() {
            if !type_allowed(&pattern.entity_type, types) {
                continue;
            }
            let spans = self
                .cache
                .get_or_scan(&pattern.id, &digest, || pattern.find_spans(text));
            for &(start, end) in spans.iter() {
                findings.push(EntitySpan {
                    entity_type: pattern.entity_type.clone(),
                    start,
                    end,
                    matched_text: text[start..end].to_string(),
                    confidence: pattern.base_confidence,
                    method: DetectionMethod::Pattern,
                    pattern_id: Some(pattern.id.clone()),
                    metadata: std::collections::HashMap::new(),
                });
            }
        }
        findings
    }
}

fn type_allowed(entity_type: &EntityType, types: Option<&[EntityType]>) -> bool {
    match types {
        Some(allowed) => allowed.contains(entity_type),
        None => true,
    }
}

/// Collapse same-type overlapping findings, keeping the highest
/// confidence; ties prefer the longer span. Overlaps across different
/// types are preserved for the masking layer to resolve.
fn merge_overlaps(mut findings: Vec<EntitySpan>) -> Vec<EntitySpan> {
    findings.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (b.end - b.start).cmp(&(a.end - a.start)))
            .then_with(|| a.start.cmp(&b.start))
    });

    let mut kept: Vec<EntitySpan> = Vec::with_capacity(findings.len());
    for span in findings {
        let shadowed = kept
            .iter()
            .any(|k| k.entity_type == span.entity_type && k.overlaps(&span));
        if !shadowed {
            kept.push(span);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::analyzer::ContextAnalyzer;
    use crate::error::{Error, Result};
    use async_trait::async_trait;

    fn detector() -> EntityDetector {
        EntityDetector::new(
            Arc::new(PatternCatalog::builtin()),
            Arc::new(ScanCache::new(64)),
            0.5,
        )
    }

    struct FailingAnalyzer;

    #[async_trait]
    impl DeepAnalyzer for FailingAnalyzer {
        fn name(&self) -> &str {
            "failing"
        }

        async fn analyze(&self, _: &str, _: Vec<EntitySpan>) -> Result<Vec<EntitySpan>> {
            Err(Error::Detection("backend unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_detects_multiple_entity_types() {
        let d = detector();
        let spans = d
            .detect("mail alice@example.net or call 555-867-5309 x")
            .await;
        let types: Vec<_> = spans.iter().map(|s| s.entity_type.clone()).collect();
        assert!(types.contains(&EntityType::Email));
        assert!(types.contains(&EntityType::Phone));
    }

    #[tokio::test]
    async fn test_empty_input_yields_no_findings() {
        assert!(detector().detect("").await.is_empty());
    }

    #[test]
    fn test_detect_from_blocking_context() {
        let d = detector();
        let spans = tokio_test::block_on(d.detect("mail a@b.example"));
        assert_eq!(spans.len(), 1);
    }

    #[tokio::test]
    async fn test_repeat_scan_hits_cache_with_identical_results() {
        let d = detector();
        let text = "reach me at carol@corp.example please";
        let first = d.detect(text).await;
        let second = d.detect(text).await;
        assert_eq!(first, second);
        assert!(d.cache().hits() > 0);
    }

    #[tokio::test]
    async fn test_same_type_overlap_collapses_to_highest_confidence() {
        let d = detector();
        // phone_us (0.80) and phone_intl (0.75) can both fire here
        let spans = d.detect("call +1 555-123-4567 now").await;
        let phones: Vec<_> = spans
            .iter()
            .filter(|s| s.entity_type == EntityType::Phone)
            .collect();
        assert_eq!(phones.len(), 1);
        assert!((phones[0].confidence - 0.80).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_type_filter() {
        let d = detector();
        let spans = d
            .detect_filtered(
                "alice@example.net or 555-867-5309",
                Some(&[EntityType::Email]),
                None,
            )
            .await;
        assert!(spans.iter().all(|s| s.entity_type == EntityType::Email));
        assert_eq!(spans.len(), 1);
    }

    #[tokio::test]
    async fn test_confidence_floor_filters_findings() {
        let d = detector();
        let spans = d
            .detect_filtered("call 555-867-5309", None, Some(0.9))
            .await;
        assert!(spans.is_empty());
    }

    #[tokio::test]
    async fn test_analyzer_failure_keeps_pattern_findings() {
        let d = detector().with_analyzer(Arc::new(FailingAnalyzer));
        let spans = d.detect("mail alice@example.net").await;
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].method, DetectionMethod::Pattern);
    }

    #[tokio::test]
    async fn test_analyzer_additions_survive_merge() {
        let d = detector().with_analyzer(Arc::new(ContextAnalyzer::new()));
        let spans = d.detect("escalated to Dr. Maya Chen, email maya@hosp.example").await;
        assert!(spans
            .iter()
            .any(|s| s.entity_type == EntityType::PersonName));
        assert!(spans.iter().any(|s| s.entity_type == EntityType::Email));
    }
}
