//! Risk scoring
//!
//! Resolution order: whitelist filtering, blacklist scan, entropy pass,
//! then the severity ladder. Whitelisted values are removed before any
//! aggregation, so a whitelisted match can never raise risk.

use regex::Regex;
use tracing::warn;

use super::policy::PreventionPolicy;
use super::{LeakageReport, RiskLevel};
use crate::detect::{DetectionMethod, EntitySpan, EntityType, Severity};
use crate::error::{Error, Result};

/// Minimum token length considered by the entropy pass
const ENTROPY_MIN_LEN: usize = 20;

/// Shannon entropy (bits per char) above which a token is flagged
const ENTROPY_THRESHOLD: f64 = 4.0;

/// Scores detection findings under a prevention policy
pub struct RiskScorer;

impl RiskScorer {
    /// Score `entities` found in `text` under `policy`.
    pub fn score(
        text: &str,
        entities: Vec<EntitySpan>,
        policy: &PreventionPolicy,
    ) -> Result<LeakageReport> {
        if !(0.0..=1.0).contains(&policy.detection_threshold) {
            return Err(Error::Leakage(format!(
                "policy '{}' detection_threshold {} outside [0, 1]",
                policy.name, policy.detection_threshold
            )));
        }
        if !(0.0..=1.0).contains(&policy.allowed_exposure_ratio) {
            return Err(Error::Leakage(format!(
                "policy '{}' allowed_exposure_ratio {} outside [0, 1]",
                policy.name, policy.allowed_exposure_ratio
            )));
        }

        let mut entities = entities;
        entities.retain(|span| span.confidence >= policy.detection_threshold);

        // Whitelist: drop findings whose value is known-safe
        let whitelist = compile_patterns(&policy.whitelist, "whitelist");
        entities.retain(|span| {
            !whitelist
                .iter()
                .any(|re| full_match(re, &span.matched_text))
        });

        // Blacklist: raw payload scan, independent of detection
        let mut blacklist_hits = Vec::new();
        for re in compile_patterns(&policy.blacklist, "blacklist") {
            if re.is_match(text) {
                blacklist_hits.push(re.as_str().to_string());
            }
        }

        if policy.entropy_scan {
            for span in entropy_findings(text) {
                let duplicate = entities.iter().any(|e| e.overlaps(&span));
                if !duplicate && span.confidence >= policy.detection_threshold {
                    entities.push(span);
                }
            }
        }
        entities.sort_by_key(|span| (span.start, span.end));

        let critical = count_at_least(&entities, Severity::Critical);
        let high = count_at_least(&entities, Severity::High);
        let medium = count_at_least(&entities, Severity::Medium);

        let mut risk = if entities.is_empty() && blacklist_hits.is_empty() {
            RiskLevel::None
        } else {
            RiskLevel::Low
        };
        if high >= 1 || medium >= 3 {
            risk = risk.max(RiskLevel::Medium);
        }
        if policy.strict_mode && critical >= 1 {
            risk = risk.max(RiskLevel::High);
        }
        if !blacklist_hits.is_empty() {
            risk = risk.max(RiskLevel::High);
        }

        let exposure_ratio = exposure_ratio(text, &entities);
        let mut recommendations = Vec::new();
        if risk > RiskLevel::None && exposure_ratio > policy.allowed_exposure_ratio {
            risk = risk.escalate();
            recommendations
                .push("finding density exceeds the allowed exposure ratio".to_string());
        }

        for hit in &blacklist_hits {
            recommendations.push(format!("payload matches blocked pattern: {}", hit));
        }
        if critical > 0 {
            recommendations
                .push("mask or remove critical findings before export".to_string());
        }
        if entities
            .iter()
            .any(|e| e.method == DetectionMethod::Entropy)
        {
            recommendations
                .push("high-entropy tokens present, rotate any real secrets".to_string());
        }

        let confidence = report_confidence(&entities, &blacklist_hits);
        let mut detection_methods = Vec::new();
        for entity in &entities {
            if !detection_methods.contains(&entity.method) {
                detection_methods.push(entity.method);
            }
        }
        let mut metadata = std::collections::HashMap::new();
        metadata.insert("policy".to_string(), policy.name.clone());
        Ok(LeakageReport {
            has_leakage: !entities.is_empty() || !blacklist_hits.is_empty(),
            risk_level: risk,
            entities,
            blacklist_hits,
            detection_methods,
            confidence,
            exposure_ratio,
            recommendations,
            metadata,
            scanned_at: chrono::Utc::now(),
        })
    }
}

/// Compile policy regexes; invalid entries are logged and skipped so a
/// bad allowlist entry cannot take down scanning.
fn compile_patterns(patterns: &[String], kind: &str) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(kind, pattern = %p, error = %e, "skipping invalid policy pattern");
                None
            }
        })
        .collect()
}

fn full_match(re: &Regex, value: &str) -> bool {
    re.find(value)
        .map(|m| m.start() == 0 && m.end() == value.len())
        .unwrap_or(false)
}

fn count_at_least(entities: &[EntitySpan], floor: Severity) -> usize {
    entities
        .iter()
        .filter(|e| e.entity_type.severity() >= floor)
        .count()
}

/// Fraction of payload bytes covered by the union of finding ranges
fn exposure_ratio(text: &str, entities: &[EntitySpan]) -> f64 {
    if text.is_empty() || entities.is_empty() {
        return 0.0;
    }
    let mut ranges: Vec<(usize, usize)> = entities
        .iter()
        .map(|e| (e.start, e.end.min(text.len())))
        .collect();
    ranges.sort_unstable();
    let mut covered = 0usize;
    let mut cursor = 0usize;
    for (start, end) in ranges {
        let start = start.max(cursor);
        if end > start {
            covered += end - start;
            cursor = end;
        }
    }
    covered as f64 / text.len() as f64
}

/// Blend of average finding confidence and cross-method agreement.
/// No findings at all means a confident clean verdict.
fn report_confidence(entities: &[EntitySpan], blacklist_hits: &[String]) -> f64 {
    if entities.is_empty() {
        return if blacklist_hits.is_empty() { 1.0 } else { 0.9 };
    }
    let avg: f64 =
        entities.iter().map(|e| e.confidence).sum::<f64>() / entities.len() as f64;
    let corroborated = entities
        .iter()
        .filter(|e| {
            entities
                .iter()
                .any(|o| o.method != e.method && o.overlaps(e))
        })
        .count();
    let agreement = corroborated as f64 / entities.len() as f64;
    (0.7 * avg + 0.3 * agreement).clamp(0.0, 1.0)
}

/// Flag long high-entropy tokens as possible unpatterned secrets
fn entropy_findings(text: &str) -> Vec<EntitySpan> {
    let mut findings = Vec::new();
    let mut token_start: Option<usize> = None;
    let bytes_len = text.len();

    let flush = |start: usize, end: usize, findings: &mut Vec<EntitySpan>, text: &str| {
        let token = &text[start..end];
        if token.chars().count() < ENTROPY_MIN_LEN {
            return;
        }
        let entropy = shannon_entropy(token);
        if entropy > ENTROPY_THRESHOLD {
            let confidence = (0.5 + (entropy - ENTROPY_THRESHOLD) * 0.25).min(0.95);
            let mut metadata = std::collections::HashMap::new();
            metadata.insert("entropy".to_string(), format!("{:.2}", entropy));
            findings.push(EntitySpan {
                entity_type: EntityType::GenericSecret,
                start,
                end,
                matched_text: token.to_string(),
                confidence,
                method: DetectionMethod::Entropy,
                pattern_id: None,
                metadata,
            });
        }
    };

    for (i, c) in text.char_indices() {
        let token_char = c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '_' | '-');
        match (token_char, token_start) {
            (true, None) => token_start = Some(i),
            (false, Some(start)) => {
                flush(start, i, &mut findings, text);
                token_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = token_start {
        flush(start, bytes_len, &mut findings, text);
    }
    findings
}

/// Shannon entropy in bits per character
fn shannon_entropy(token: &str) -> f64 {
    let mut counts = std::collections::HashMap::new();
    let mut total = 0usize;
    for c in token.chars() {
        *counts.entry(c).or_insert(0usize) += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    counts
        .values()
        .map(|&n| {
            let p = n as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}
