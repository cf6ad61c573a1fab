//! Leakage risk scoring and export gating
//!
//! The scorer turns detection findings into a risk report under a
//! prevention policy; the gate turns the report into an allow / mask /
//! block decision. Scoring is fail-safe: an internal error yields a
//! high-risk report instead of a silent pass.

pub mod gate;
pub mod policy;
pub mod scorer;

pub use gate::{ExportDecision, PolicyGate};
pub use policy::PreventionPolicy;
pub use scorer::RiskScorer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::detect::{DetectionMethod, EntitySpan};

/// Overall leakage risk of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// One step up the ladder, saturating at Critical
    pub fn escalate(self) -> Self {
        match self {
            RiskLevel::None => RiskLevel::Low,
            RiskLevel::Low => RiskLevel::Medium,
            RiskLevel::Medium => RiskLevel::High,
            RiskLevel::High | RiskLevel::Critical => RiskLevel::Critical,
        }
    }
}

/// Outcome of one leakage scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeakageReport {
    /// Whether anything risky was found at all
    pub has_leakage: bool,

    /// Resolved risk level
    pub risk_level: RiskLevel,

    /// Findings that survived whitelist filtering
    pub entities: Vec<EntitySpan>,

    /// Blacklist patterns that fired
    pub blacklist_hits: Vec<String>,

    /// Distinct detection methods that contributed findings
    pub detection_methods: Vec<DetectionMethod>,

    /// Scorer confidence in the report, in [0.0, 1.0]
    pub confidence: f64,

    /// Fraction of payload bytes covered by findings
    pub exposure_ratio: f64,

    /// Operator-facing remediation hints
    pub recommendations: Vec<String>,

    /// Free-form scan annotations (policy name, degraded-mode notes)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,

    /// When the scan ran
    pub scanned_at: DateTime<Utc>,
}
