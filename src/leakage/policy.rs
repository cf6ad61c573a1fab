//! Prevention policies
//!
//! A policy is operator data: it travels as TOML or JSON, so every
//! field carries a serde default and a freshly deserialized empty table
//! is a usable (strict) policy.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_threshold() -> f64 {
    0.5
}

fn default_exposure() -> f64 {
    0.05
}

/// Leakage prevention policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreventionPolicy {
    /// Policy name, used in audit events
    #[serde(default)]
    pub name: String,

    /// A disabled policy gates nothing; scans still report risk
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Regexes for values that are known-safe and removed from scoring
    /// before aggregation (test fixtures, documented examples)
    #[serde(default)]
    pub whitelist: Vec<String>,

    /// Regexes whose presence anywhere in the payload forces at least
    /// high risk
    #[serde(default)]
    pub blacklist: Vec<String>,

    /// Critical-severity findings force at least high risk
    #[serde(default = "default_true")]
    pub strict_mode: bool,

    /// Block exports at or above high risk without an operator override
    #[serde(default = "default_true")]
    pub auto_block: bool,

    /// Findings below this confidence do not count toward risk
    #[serde(default = "default_threshold")]
    pub detection_threshold: f64,

    /// Fraction of payload bytes findings may cover before risk is
    /// raised one step
    #[serde(default = "default_exposure")]
    pub allowed_exposure_ratio: f64,

    /// Run the entropy pass for unpatterned secrets
    #[serde(default = "default_true")]
    pub entropy_scan: bool,
}

impl Default for PreventionPolicy {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            enabled: true,
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            strict_mode: true,
            auto_block: true,
            detection_threshold: default_threshold(),
            allowed_exposure_ratio: default_exposure(),
            entropy_scan: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_a_strict_policy() {
        let policy: PreventionPolicy = toml::from_str("").unwrap();
        assert!(policy.enabled);
        assert!(policy.strict_mode);
        assert!(policy.auto_block);
        assert!(policy.whitelist.is_empty());
        assert_eq!(policy.detection_threshold, 0.5);
    }

    #[test]
    fn test_policy_round_trip() {
        let policy: PreventionPolicy = toml::from_str(
            r#"
            name = "export-review"
            whitelist = ['\btest@example\.com\b']
            blacklist = ['(?i)internal use only']
            strict_mode = false
            auto_block = false
            "#,
        )
        .unwrap();
        assert_eq!(policy.name, "export-review");
        assert_eq!(policy.whitelist.len(), 1);
        assert!(!policy.auto_block);
    }
}
