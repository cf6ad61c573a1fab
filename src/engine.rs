//! Engine facade
//!
//! `ScrubEngine` wires the detection, masking, leakage, and
//! classification layers behind one surface and carries the operation
//! metrics and event sinks. All entry points are safe to share behind
//! an `Arc`.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::batch::{BatchOutcome, BatchProcessor};
use crate::classify::{DatasetClassification, DatasetClassifier, FieldClassification};
use crate::config::ScrubConfig;
use crate::detect::{
    ChunkScanner, ContextAnalyzer, EntityDetector, EntitySpan, PatternCatalog, ScanCache,
    Severity,
};
use crate::error::{Error, Result};
use crate::leakage::{
    ExportDecision, LeakageReport, PolicyGate, PreventionPolicy, RiskLevel, RiskScorer,
};
use crate::mask::{
    rules::validate_rules, AnonymizationResult, MaskStrategy, MaskingRule, RuleAnonymizer,
};
use crate::sink::{AlertEvent, AuditEvent, EventSinks};

/// A leakage-scan input: raw text, a JSON document, or a list of
/// payloads scored as one unit.
#[derive(Debug, Clone)]
pub enum ScanPayload {
    Text(String),
    Json(serde_json::Value),
    List(Vec<String>),
}

impl ScanPayload {
    /// Flatten to the text the scorer sees. JSON contributes its
    /// string leaves, one per line; lists join the same way.
    pub fn flatten(&self) -> String {
        match self {
            ScanPayload::Text(text) => text.clone(),
            ScanPayload::Json(value) => {
                let mut leaves = Vec::new();
                collect_string_leaves(value, String::new(), &mut leaves);
                leaves
                    .into_iter()
                    .map(|(_, text)| text)
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            ScanPayload::List(items) => items.join("\n"),
        }
    }
}

impl From<&str> for ScanPayload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for ScanPayload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<serde_json::Value> for ScanPayload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<Vec<String>> for ScanPayload {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

/// Point-in-time view of the engine counters
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub scans: u64,
    pub bytes_scanned: u64,
    pub entities_found: u64,
    pub masks_applied: u64,
    pub exports_blocked: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub events_dropped: u64,
}

#[derive(Default)]
struct EngineCounters {
    scans: AtomicU64,
    bytes_scanned: AtomicU64,
    entities_found: AtomicU64,
    masks_applied: AtomicU64,
    exports_blocked: AtomicU64,
}

/// PII detection, masking, and leakage prevention engine
pub struct ScrubEngine {
    config: ScrubConfig,
    detector: Arc<EntityDetector>,
    chunker: Arc<ChunkScanner>,
    classifier: DatasetClassifier,
    batch: BatchProcessor,
    sinks: EventSinks,
    counters: EngineCounters,
}

impl ScrubEngine {
    /// Build an engine with the builtin catalog and disabled sinks.
    pub fn new(config: ScrubConfig) -> Result<Self> {
        Self::with_catalog(config, PatternCatalog::builtin(), EventSinks::disabled())
    }

    /// Build an engine with a custom catalog and sinks.
    pub fn with_catalog(
        config: ScrubConfig,
        catalog: PatternCatalog,
        sinks: EventSinks,
    ) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(ScanCache::new(config.detection.cache_size));
        let mut detector = EntityDetector::new(
            Arc::new(catalog),
            cache,
            config.detection.min_confidence,
        );
        if config.detection.deep_analysis {
            detector = detector.with_analyzer(Arc::new(ContextAnalyzer::new()));
        }
        let detector = Arc::new(detector);

        let timeout = Duration::from_secs(config.detection.detection_timeout_seconds);
        let chunker = Arc::new(ChunkScanner::new(
            Arc::clone(&detector),
            config.chunk_size_bytes(),
            config.detection.overlap_chars,
            config.batch.max_concurrent_operations,
            timeout,
        ));
        let classifier = DatasetClassifier::new(Arc::clone(&detector), 32);
        let batch = BatchProcessor::new(&config.batch, timeout);

        Ok(Self {
            config,
            detector,
            chunker,
            classifier,
            batch,
            sinks,
            counters: EngineCounters::default(),
        })
    }

    pub fn config(&self) -> &ScrubConfig {
        &self.config
    }

    /// Prevention policy assembled from the configured leakage defaults
    pub fn default_policy(&self) -> PreventionPolicy {
        PreventionPolicy {
            strict_mode: self.config.leakage.strict_mode,
            auto_block: self.config.leakage.auto_block,
            detection_threshold: self.config.leakage.detection_threshold,
            allowed_exposure_ratio: self.config.leakage.allowed_exposure_ratio,
            ..PreventionPolicy::default()
        }
    }

    /// Detect entities in a payload, chunking oversized input.
    pub async fn scan(&self, text: &str) -> Vec<EntitySpan> {
        let started = Instant::now();
        let spans = self.chunker.scan(text).await;
        self.record_scan(text.len(), spans.len());
        self.sinks.emit_audit(AuditEvent::new(
            "scan",
            spans.len(),
            None,
            started.elapsed().as_millis() as u64,
        ));
        spans
    }

    /// Detect entities in every string leaf of a JSON document.
    /// Returned paths are JSON pointers.
    pub async fn scan_json(&self, value: &serde_json::Value) -> Vec<(String, Vec<EntitySpan>)> {
        let mut leaves = Vec::new();
        collect_string_leaves(value, String::new(), &mut leaves);
        let mut findings = Vec::new();
        for (path, text) in leaves {
            let spans = self.chunker.scan(&text).await;
            self.record_scan(text.len(), spans.len());
            if !spans.is_empty() {
                findings.push((path, spans));
            }
        }
        findings
    }

    /// Mask a payload under a validated rule set.
    pub async fn mask(
        &self,
        text: &str,
        rules: &[MaskingRule],
    ) -> Result<AnonymizationResult> {
        validate_rules(rules)?;
        let started = Instant::now();
        let entities = self.chunker.scan(text).await;
        self.record_scan(text.len(), entities.len());
        let result = RuleAnonymizer::anonymize(text, &entities, rules);
        self.counters
            .masks_applied
            .fetch_add(result.entities_masked as u64, Ordering::Relaxed);
        self.sinks.emit_audit(AuditEvent::new(
            "mask",
            entities.len(),
            None,
            started.elapsed().as_millis() as u64,
        ));
        Ok(result)
    }

    /// Mask every string leaf of a JSON document in place, using the
    /// owning key as field context for field-scoped rules.
    pub async fn mask_json(
        &self,
        value: &serde_json::Value,
        rules: &[MaskingRule],
    ) -> Result<serde_json::Value> {
        validate_rules(rules)?;
        let mut output = value.clone();
        self.mask_json_node(&mut output, None, rules).await;
        Ok(output)
    }

    fn mask_json_node<'a>(
        &'a self,
        node: &'a mut serde_json::Value,
        field: Option<String>,
        rules: &'a [MaskingRule],
    ) -> futures::future::BoxFuture<'a, ()> {
        Box::pin(async move {
            match node {
                serde_json::Value::String(text) => {
                    let entities = self.detector.detect(text).await;
                    if !entities.is_empty() {
                        let result = RuleAnonymizer::anonymize_field(
                            field.as_deref(),
                            text,
                            &entities,
                            rules,
                        );
                        self.counters
                            .masks_applied
                            .fetch_add(result.entities_masked as u64, Ordering::Relaxed);
                        *text = result.anonymized_text;
                    }
                }
                serde_json::Value::Object(map) => {
                    for (key, child) in map.iter_mut() {
                        self.mask_json_node(child, Some(key.clone()), rules).await;
                    }
                }
                serde_json::Value::Array(items) => {
                    for child in items.iter_mut() {
                        self.mask_json_node(child, field.clone(), rules).await;
                    }
                }
                _ => {}
            }
        })
    }

    /// Score a payload for leakage risk. Fail-safe: an internal error
    /// produces a high-risk report instead of a clean one.
    pub async fn scan_for_leakage(
        &self,
        payload: impl Into<ScanPayload>,
        policy: &PreventionPolicy,
    ) -> LeakageReport {
        let text = payload.into().flatten();
        self.leakage_report(&text, policy).await
    }

    async fn leakage_report(&self, text: &str, policy: &PreventionPolicy) -> LeakageReport {
        let entities = self.chunker.scan(text).await;
        self.record_scan(text.len(), entities.len());
        let mut report = match RiskScorer::score(text, entities, policy) {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "leakage scan failed, reporting fail-safe high risk");
                fail_safe_report(&e)
            }
        };
        if !self.config.detection.deep_analysis {
            report
                .metadata
                .insert("deep_analysis".to_string(), "disabled".to_string());
        }
        if report.risk_level >= RiskLevel::High {
            self.sinks.emit_alert(AlertEvent::new(
                report.risk_level,
                &format!(
                    "leakage risk {:?} under policy '{}'",
                    report.risk_level, policy.name
                ),
            ));
        }
        report
    }

    /// Gate a payload for export: allow below medium risk, release the
    /// masked rendering at medium, block (or mask, per policy) above.
    /// Empty `rules` fall back to the per-type defaults.
    pub async fn prevent_export(
        &self,
        text: &str,
        policy: &PreventionPolicy,
        rules: &[MaskingRule],
    ) -> Result<ExportDecision> {
        self.gate_export(text, policy, rules, None).await
    }

    /// `prevent_export` with an audited operator override for blocks.
    pub async fn prevent_export_with_override(
        &self,
        text: &str,
        policy: &PreventionPolicy,
        rules: &[MaskingRule],
        authorized_by: &str,
    ) -> Result<ExportDecision> {
        self.gate_export(text, policy, rules, Some(authorized_by)).await
    }

    async fn gate_export(
        &self,
        text: &str,
        policy: &PreventionPolicy,
        rules: &[MaskingRule],
        authorized_by: Option<&str>,
    ) -> Result<ExportDecision> {
        let started = Instant::now();
        let owned_defaults;
        let rules = if rules.is_empty() {
            owned_defaults = default_rules();
            owned_defaults.as_slice()
        } else {
            validate_rules(rules)?;
            rules
        };

        let report = self.leakage_report(text, policy).await;
        let masked = RuleAnonymizer::anonymize(text, &report.entities, rules);
        self.counters
            .masks_applied
            .fetch_add(masked.entities_masked as u64, Ordering::Relaxed);

        let decision = match authorized_by {
            Some(operator) => PolicyGate::decide_with_override(
                text,
                &masked.anonymized_text,
                report,
                policy,
                operator,
            ),
            None => PolicyGate::decide(text, &masked.anonymized_text, report, policy),
        };

        if decision.blocked {
            self.counters.exports_blocked.fetch_add(1, Ordering::Relaxed);
        }
        self.sinks.emit_audit(AuditEvent::new(
            "prevent_export",
            decision.report.entities.len(),
            Some(decision.report.risk_level),
            started.elapsed().as_millis() as u64,
        ));
        info!(
            risk = ?decision.report.risk_level,
            allowed = decision.allowed,
            masked = decision.masked,
            "export decision"
        );
        Ok(decision)
    }

    /// Classify a single field from sample values.
    pub async fn classify_field(
        &self,
        field_name: &str,
        samples: &[String],
    ) -> FieldClassification {
        self.classifier.field().classify(field_name, samples).await
    }

    /// Classify a dataset of named fields.
    pub async fn classify_dataset(
        &self,
        dataset_id: &str,
        fields: &[(String, Vec<String>)],
    ) -> DatasetClassification {
        let started = Instant::now();
        let result = self.classifier.classify(dataset_id, fields).await;
        self.sinks.emit_audit(AuditEvent::new(
            "classify",
            result.sensitive_field_count,
            None,
            started.elapsed().as_millis() as u64,
        ));
        result
    }

    /// Scan many payloads concurrently. One outcome per input, in
    /// input order; `cancel` stops unstarted units.
    pub async fn scan_batch(
        &self,
        inputs: Vec<String>,
        cancel: CancellationToken,
    ) -> Vec<BatchOutcome<Vec<EntitySpan>>> {
        let chunker = Arc::clone(&self.chunker);
        let byte_lens: Vec<usize> = inputs.iter().map(|s| s.len()).collect();
        let outcomes = self
            .batch
            .run(inputs, cancel, move |input| {
                let chunker = Arc::clone(&chunker);
                async move { Ok(chunker.scan(&input).await) }
            })
            .await;
        for outcome in &outcomes {
            if let Some(spans) = &outcome.value {
                self.record_scan(byte_lens[outcome.index], spans.len());
            }
        }
        outcomes
    }

    /// Mask many payloads concurrently under one rule set. One outcome
    /// per input, in input order; `cancel` stops unstarted units.
    pub async fn mask_batch(
        &self,
        inputs: Vec<String>,
        rules: &[MaskingRule],
        cancel: CancellationToken,
    ) -> Result<Vec<BatchOutcome<AnonymizationResult>>> {
        validate_rules(rules)?;
        let chunker = Arc::clone(&self.chunker);
        let rules = Arc::new(rules.to_vec());
        let outcomes = self
            .batch
            .run(inputs, cancel, move |input| {
                let chunker = Arc::clone(&chunker);
                let rules = Arc::clone(&rules);
                async move {
                    let entities = chunker.scan(&input).await;
                    Ok(RuleAnonymizer::anonymize(&input, &entities, &rules))
                }
            })
            .await;
        for outcome in &outcomes {
            if let Some(result) = &outcome.value {
                self.record_scan(result.original_text.len(), result.entities.len());
                self.counters
                    .masks_applied
                    .fetch_add(result.entities_masked as u64, Ordering::Relaxed);
            }
        }
        Ok(outcomes)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            scans: self.counters.scans.load(Ordering::Relaxed),
            bytes_scanned: self.counters.bytes_scanned.load(Ordering::Relaxed),
            entities_found: self.counters.entities_found.load(Ordering::Relaxed),
            masks_applied: self.counters.masks_applied.load(Ordering::Relaxed),
            exports_blocked: self.counters.exports_blocked.load(Ordering::Relaxed),
            cache_hits: self.detector.cache().hits(),
            cache_misses: self.detector.cache().misses(),
            events_dropped: self.sinks.dropped(),
        }
    }

    fn record_scan(&self, bytes: usize, entities: usize) {
        self.counters.scans.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_scanned
            .fetch_add(bytes as u64, Ordering::Relaxed);
        self.counters
            .entities_found
            .fetch_add(entities as u64, Ordering::Relaxed);
    }
}

/// Report produced when the scorer itself fails: never a silent pass.
fn fail_safe_report(error: &Error) -> LeakageReport {
    LeakageReport {
        has_leakage: true,
        risk_level: RiskLevel::High,
        entities: Vec::new(),
        blacklist_hits: Vec::new(),
        detection_methods: Vec::new(),
        confidence: 0.0,
        exposure_ratio: 0.0,
        recommendations: vec![format!(
            "leakage scan failed ({}), treat payload as sensitive and retry",
            error
        )],
        metadata: std::collections::HashMap::from([(
            "error".to_string(),
            error.to_string(),
        )]),
        scanned_at: chrono::Utc::now(),
    }
}

/// One default rule per builtin entity type: redact critical, hash
/// high, mask medium, keep low.
pub fn default_rules() -> Vec<MaskingRule> {
    use crate::detect::EntityType::*;
    [
        Email, Phone, CreditCard, NationalId, IpAddress, MacAddress, Iban, ApiKey,
        CredentialHash, Password, Url, DateOfBirth, PersonName, GenericSecret,
    ]
    .into_iter()
    .filter_map(|entity_type| {
        let strategy = match entity_type.severity() {
            Severity::Critical => MaskStrategy::Redact,
            Severity::High => MaskStrategy::Hash {
                salt: "safescrub".to_string(),
                keep: 16,
            },
            Severity::Medium => MaskStrategy::Mask {
                mask_char: '*',
                count: None,
                from_end: false,
            },
            Severity::Low => MaskStrategy::Keep,
        };
        let id = format!("default_{}", entity_type.label().to_lowercase());
        MaskingRule::for_type(&id, entity_type, strategy).ok()
    })
    .collect()
}

fn collect_string_leaves(
    value: &serde_json::Value,
    path: String,
    leaves: &mut Vec<(String, String)>,
) {
    match value {
        serde_json::Value::String(s) => leaves.push((path, s.clone())),
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                collect_string_leaves(child, format!("{}/{}", path, key), leaves);
            }
        }
        serde_json::Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_string_leaves(child, format!("{}/{}", path, i), leaves);
            }
        }
        _ => {}
    }
}
