//! Export gating
//!
//! Turns a leakage report into an allow / mask / block decision. Below
//! medium risk the payload passes untouched; medium risk passes only in
//! masked form; high risk blocks under auto_block and otherwise falls
//! back to the masked form. Overrides are always audited.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::policy::PreventionPolicy;
use super::{LeakageReport, RiskLevel};

/// Gate verdict for one export attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDecision {
    /// Whether anything may leave at all
    pub allowed: bool,

    /// Whether the original payload was withheld entirely
    pub blocked: bool,

    /// Whether `safe_output` is the masked rendering rather than the
    /// original
    pub masked: bool,

    /// What may leave, if anything
    pub safe_output: Option<String>,

    /// The report the decision was made from
    pub report: LeakageReport,

    /// Operator who overrode a block, when one did
    pub overridden_by: Option<String>,
}

/// Applies a prevention policy to a scored payload
pub struct PolicyGate;

impl PolicyGate {
    /// Decide what may leave for a payload with the given report.
    /// `masked` is the payload's masked rendering.
    pub fn decide(
        original: &str,
        masked: &str,
        report: LeakageReport,
        policy: &PreventionPolicy,
    ) -> ExportDecision {
        if !policy.enabled {
            return ExportDecision {
                allowed: true,
                blocked: false,
                masked: false,
                safe_output: Some(original.to_string()),
                report,
                overridden_by: None,
            };
        }

        if report.risk_level <= RiskLevel::Low {
            return ExportDecision {
                allowed: true,
                blocked: false,
                masked: false,
                safe_output: Some(original.to_string()),
                report,
                overridden_by: None,
            };
        }

        if report.risk_level == RiskLevel::Medium || !policy.auto_block {
            return ExportDecision {
                allowed: true,
                blocked: false,
                masked: true,
                safe_output: Some(masked.to_string()),
                report,
                overridden_by: None,
            };
        }

        info!(policy = %policy.name, risk = ?report.risk_level, "export blocked");
        ExportDecision {
            allowed: false,
            blocked: true,
            masked: false,
            safe_output: None,
            report,
            overridden_by: None,
        }
    }

    /// Decide with an operator override: a would-be block passes in
    /// masked form instead, attributed to `authorized_by`.
    pub fn decide_with_override(
        original: &str,
        masked: &str,
        report: LeakageReport,
        policy: &PreventionPolicy,
        authorized_by: &str,
    ) -> ExportDecision {
        let mut decision = Self::decide(original, masked, report, policy);
        if decision.blocked {
            warn!(
                authorized_by,
                policy = %policy.name,
                risk = ?decision.report.risk_level,
                "blocked export released by operator override"
            );
            decision.allowed = true;
            decision.blocked = false;
            decision.masked = true;
            decision.safe_output = Some(masked.to_string());
            decision.overridden_by = Some(authorized_by.to_string());
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(risk_level: RiskLevel) -> LeakageReport {
        LeakageReport {
            has_leakage: risk_level > RiskLevel::None,
            risk_level,
            entities: Vec::new(),
            blacklist_hits: Vec::new(),
            detection_methods: Vec::new(),
            confidence: 0.9,
            exposure_ratio: 0.0,
            recommendations: Vec::new(),
            metadata: Default::default(),
            scanned_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_low_risk_passes_original() {
        let d = PolicyGate::decide("raw", "masked", report(RiskLevel::Low), &Default::default());
        assert!(d.allowed && !d.blocked && !d.masked);
        assert_eq!(d.safe_output.as_deref(), Some("raw"));
    }

    #[test]
    fn test_medium_risk_passes_masked_only() {
        let d =
            PolicyGate::decide("raw", "masked", report(RiskLevel::Medium), &Default::default());
        assert!(d.allowed && d.masked);
        assert_eq!(d.safe_output.as_deref(), Some("masked"));
    }

    #[test]
    fn test_high_risk_blocks_under_auto_block() {
        let d = PolicyGate::decide("raw", "masked", report(RiskLevel::High), &Default::default());
        assert!(!d.allowed && d.blocked);
        assert!(d.safe_output.is_none());
    }

    #[test]
    fn test_high_risk_masks_when_auto_block_off() {
        let policy = PreventionPolicy {
            auto_block: false,
            ..Default::default()
        };
        let d = PolicyGate::decide("raw", "masked", report(RiskLevel::Critical), &policy);
        assert!(d.allowed && d.masked && !d.blocked);
        assert_eq!(d.safe_output.as_deref(), Some("masked"));
    }

    #[test]
    fn test_disabled_policy_gates_nothing() {
        let policy = PreventionPolicy {
            enabled: false,
            ..Default::default()
        };
        let d = PolicyGate::decide("raw", "masked", report(RiskLevel::Critical), &policy);
        assert!(d.allowed && !d.blocked && !d.masked);
        assert_eq!(d.safe_output.as_deref(), Some("raw"));
    }

    #[test]
    fn test_override_releases_masked_form() {
        let d = PolicyGate::decide_with_override(
            "raw",
            "masked",
            report(RiskLevel::High),
            &Default::default(),
            "oncall-dpo",
        );
        assert!(d.allowed && d.masked && !d.blocked);
        assert_eq!(d.safe_output.as_deref(), Some("masked"));
        assert_eq!(d.overridden_by.as_deref(), Some("oncall-dpo"));
    }

    #[test]
    fn test_override_is_a_no_op_when_not_blocked() {
        let d = PolicyGate::decide_with_override(
            "raw",
            "masked",
            report(RiskLevel::Low),
            &Default::default(),
            "oncall-dpo",
        );
        assert!(d.overridden_by.is_none());
        assert_eq!(d.safe_output.as_deref(), Some("raw"));
    }
}
