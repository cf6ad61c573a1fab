//! Masking rules
//!
//! A rule binds an entity type to a strategy, gated by confidence and
//! optionally by a field-name pattern. Rule sets are plain slices;
//! resolution picks one active rule per entity type deterministically
//! regardless of slice order.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::strategy::MaskStrategy;
use crate::detect::{EntityType, Severity};
use crate::error::{Error, Result};

fn default_threshold() -> f64 {
    0.5
}

fn default_enabled() -> bool {
    true
}

/// A single masking rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskingRule {
    /// Unique rule id
    pub id: String,

    /// Entity type this rule handles
    pub entity_type: EntityType,

    /// Optional regex over field names; a rule with a pattern only
    /// participates when masking a field whose name matches
    #[serde(default)]
    pub field_pattern: Option<String>,

    /// Strategy applied to matching values
    pub strategy: MaskStrategy,

    /// Findings below this confidence are left unmasked by this rule
    #[serde(default = "default_threshold")]
    pub confidence_threshold: f64,

    /// Sensitivity the rule asserts for its entity type
    pub sensitivity: Severity,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Higher priority wins when several enabled rules target the same
    /// entity type; ties fall back to the smallest id
    #[serde(default)]
    pub priority: i32,
}

impl MaskingRule {
    /// Construct a validated rule with the entity type's own severity
    pub fn for_type(id: &str, entity_type: EntityType, strategy: MaskStrategy) -> Result<Self> {
        let rule = Self {
            id: id.to_string(),
            sensitivity: entity_type.severity(),
            entity_type,
            field_pattern: None,
            strategy,
            confidence_threshold: default_threshold(),
            enabled: true,
            priority: 0,
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Validate the rule. Invalid rules are rejected at creation or
    /// load time and never reach the anonymizer.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::Rule("rule id must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::Rule(format!(
                "rule {}: confidence_threshold must be within [0.0, 1.0]",
                self.id
            )));
        }
        if let Some(pattern) = &self.field_pattern {
            Regex::new(pattern).map_err(|e| {
                Error::Rule(format!("rule {}: invalid field_pattern: {}", self.id, e))
            })?;
        }
        self.strategy
            .validate()
            .map_err(|e| Error::Rule(format!("rule {}: {}", self.id, e)))
    }

    /// Whether this rule participates for the given field context
    pub fn applies_to_field(&self, field: Option<&str>) -> bool {
        match (&self.field_pattern, field) {
            (None, _) => true,
            (Some(_), None) => false,
            // Pattern validity is guaranteed by validate()
            (Some(pattern), Some(name)) => Regex::new(pattern)
                .map(|re| re.is_match(name))
                .unwrap_or(false),
        }
    }
}

/// Validate a whole rule set, rejecting duplicate ids
pub fn validate_rules(rules: &[MaskingRule]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for rule in rules {
        rule.validate()?;
        if !seen.insert(rule.id.as_str()) {
            return Err(Error::Rule(format!("duplicate rule id: {}", rule.id)));
        }
    }
    Ok(())
}

/// Pick the active rule per entity type: enabled rules only, highest
/// priority first, then lexicographically smallest id. The outcome does
/// not depend on slice order.
pub fn resolve_active<'a>(
    rules: &'a [MaskingRule],
    field: Option<&str>,
) -> HashMap<EntityType, &'a MaskingRule> {
    let mut active: HashMap<EntityType, &'a MaskingRule> = HashMap::new();
    for rule in rules {
        if !rule.enabled || !rule.applies_to_field(field) {
            continue;
        }
        let wins = match active.get(&rule.entity_type) {
            Some(current) => {
                rule.priority > current.priority
                    || (rule.priority == current.priority && rule.id < current.id)
            }
            None => true,
        };
        if wins {
            active.insert(rule.entity_type.clone(), rule);
        }
    }
    active
}
