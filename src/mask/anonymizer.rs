//! Rule application
//!
//! Replacements are applied in descending start order, so offsets of
//! not-yet-processed findings never shift. A finding overlapping an
//! already-replaced region is skipped rather than corrupting the text.

use std::collections::BTreeSet;
use tracing::debug;

use super::rules::{resolve_active, MaskingRule};
use super::AnonymizationResult;
use crate::detect::EntitySpan;

/// Applies masking rules to detected spans
pub struct RuleAnonymizer;

impl RuleAnonymizer {
    /// Mask `entities` in `text` according to `rules`.
    ///
    /// Per-entity problems (stale offsets, overlaps) are recorded in
    /// the result's `errors` and the rest of the pass continues.
    pub fn anonymize(
        text: &str,
        entities: &[EntitySpan],
        rules: &[MaskingRule],
    ) -> AnonymizationResult {
        Self::anonymize_field(None, text, entities, rules)
    }

    /// Mask with field-name context, letting field-scoped rules
    /// participate.
    pub fn anonymize_field(
        field: Option<&str>,
        text: &str,
        entities: &[EntitySpan],
        rules: &[MaskingRule],
    ) -> AnonymizationResult {
        let started = std::time::Instant::now();
        let active = resolve_active(rules, field);

        let mut skipped = 0usize;
        let mut errors = Vec::new();

        // Pair each finding with its rule; findings without an
        // applicable rule or below its threshold are left alone.
        let mut candidates: Vec<(&EntitySpan, &MaskingRule)> = Vec::new();
        for span in entities {
            let Some(rule) = active.get(&span.entity_type) else {
                skipped += 1;
                continue;
            };
            if span.confidence < rule.confidence_threshold {
                skipped += 1;
                continue;
            }
            if span.end > text.len()
                || !text.is_char_boundary(span.start)
                || !text.is_char_boundary(span.end)
                || span.start >= span.end
            {
                errors.push(format!(
                    "span {}..{} does not address the payload",
                    span.start, span.end
                ));
                skipped += 1;
                continue;
            }
            candidates.push((span, rule));
        }

        // Cross-type overlaps: highest confidence wins, then the longer
        // span, then the earlier one. Deterministic for any input order.
        candidates.sort_by(|(a, _), (b, _)| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then((b.end - b.start).cmp(&(a.end - a.start)))
                .then(a.start.cmp(&b.start))
        });
        let mut winners: Vec<(&EntitySpan, &MaskingRule)> = Vec::new();
        for (span, rule) in candidates {
            if winners.iter().any(|(kept, _)| kept.overlaps(span)) {
                errors.push(format!(
                    "span {}..{} overlaps a masked region",
                    span.start, span.end
                ));
                skipped += 1;
            } else {
                winners.push((span, rule));
            }
        }

        // Apply by descending start so pending offsets never shift
        winners.sort_by(|(a, _), (b, _)| b.start.cmp(&a.start));

        let mut output = text.to_string();
        let mut masked = 0usize;
        let mut rules_applied = BTreeSet::new();
        for (span, rule) in winners {
            let replacement = rule.strategy.apply(&span.matched_text);
            output.replace_range(span.start..span.end, &replacement);
            masked += 1;
            rules_applied.insert(rule.id.clone());
        }

        debug!(masked, skipped, "anonymization pass complete");
        AnonymizationResult {
            success: errors.is_empty(),
            original_text: text.to_string(),
            anonymized_text: output,
            entities_masked: masked,
            entities_skipped: skipped,
            rules_applied: rules_applied.into_iter().collect(),
            entities: entities.to_vec(),
            errors,
            processing_time_ms: started.elapsed().as_millis() as u64,
        }
    }
}
