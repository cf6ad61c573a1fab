//! Masking strategies
//!
//! A strategy is a pure transform of matched text. All configuration
//! problems are rejected by `validate` when the owning rule is created;
//! `apply` itself cannot fail.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Sentinel emitted by the redact strategy
pub const REDACTED_TOKEN: &str = "[REDACTED]";

fn default_keep() -> usize {
    16
}

fn default_mask_char() -> char {
    '*'
}

/// How a matched value is rewritten
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MaskStrategy {
    /// Substitute a fixed replacement string
    Replace { replacement: String },

    /// Substitute the redaction sentinel
    Redact,

    /// Salted SHA-256, hex-encoded and truncated to `keep` characters.
    /// Equal inputs under the same salt produce equal outputs.
    Hash {
        salt: String,
        #[serde(default = "default_keep")]
        keep: usize,
    },

    /// Overwrite characters with `mask_char`. `count` limits how many
    /// characters are overwritten (all when absent); `from_end` counts
    /// from the tail instead of the head.
    Mask {
        #[serde(default = "default_mask_char")]
        mask_char: char,
        #[serde(default)]
        count: Option<usize>,
        #[serde(default)]
        from_end: bool,
    },

    /// Leave the value untouched (still counts as handled)
    Keep,
}

impl MaskStrategy {
    /// Reject unusable configurations
    pub fn validate(&self) -> Result<()> {
        match self {
            MaskStrategy::Replace { replacement } => {
                if replacement.is_empty() {
                    return Err(Error::Rule(
                        "replace strategy needs a non-empty replacement".to_string(),
                    ));
                }
            }
            MaskStrategy::Hash { keep, .. } => {
                if !(4..=64).contains(keep) {
                    return Err(Error::Rule(
                        "hash strategy keep must be within [4, 64]".to_string(),
                    ));
                }
            }
            MaskStrategy::Mask { count, mask_char, .. } => {
                if *count == Some(0) {
                    return Err(Error::Rule(
                        "mask strategy count must be positive".to_string(),
                    ));
                }
                if mask_char.is_control() {
                    return Err(Error::Rule(
                        "mask strategy character must be printable".to_string(),
                    ));
                }
            }
            MaskStrategy::Redact | MaskStrategy::Keep => {}
        }
        Ok(())
    }

    /// Transform a matched value. Pure and infallible for validated
    /// strategies.
    pub fn apply(&self, text: &str) -> String {
        match self {
            MaskStrategy::Replace { replacement } => replacement.clone(),
            MaskStrategy::Redact => REDACTED_TOKEN.to_string(),
            MaskStrategy::Hash { salt, keep } => {
                let mut hasher = Sha256::new();
                hasher.update(salt.as_bytes());
                hasher.update(text.as_bytes());
                let digest = format!("{:x}", hasher.finalize());
                digest[..(*keep).min(digest.len())].to_string()
            }
            MaskStrategy::Mask {
                mask_char,
                count,
                from_end,
            } => {
                let chars: Vec<char> = text.chars().collect();
                let total = chars.len();
                let n = count.unwrap_or(total).min(total);
                let range = if *from_end {
                    (total - n)..total
                } else {
                    0..n
                };
                chars
                    .into_iter()
                    .enumerate()
                    .map(|(i, c)| if range.contains(&i) { *mask_char } else { c })
                    .collect()
            }
            MaskStrategy::Keep => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_and_redact() {
        let replace = MaskStrategy::Replace {
            replacement: "[EMAIL]".to_string(),
        };
        assert_eq!(replace.apply("a@b.com"), "[EMAIL]");
        assert_eq!(MaskStrategy::Redact.apply("anything"), REDACTED_TOKEN);
    }

    #[test]
    fn test_hash_is_deterministic_and_salted() {
        let a = MaskStrategy::Hash {
            salt: "s1".to_string(),
            keep: 16,
        };
        let b = MaskStrategy::Hash {
            salt: "s2".to_string(),
            keep: 16,
        };
        let h1 = a.apply("555-12-3456");
        assert_eq!(h1, a.apply("555-12-3456"));
        assert_eq!(h1.len(), 16);
        assert_ne!(h1, b.apply("555-12-3456"));
    }

    #[test]
    fn test_mask_all_and_partial() {
        let all = MaskStrategy::Mask {
            mask_char: '*',
            count: None,
            from_end: false,
        };
        assert_eq!(all.apply("secret"), "******");

        let tail = MaskStrategy::Mask {
            mask_char: '#',
            count: Some(4),
            from_end: true,
        };
        assert_eq!(tail.apply("555-867-5309"), "555-867-####");

        let head = MaskStrategy::Mask {
            mask_char: '*',
            count: Some(8),
            from_end: false,
        };
        assert_eq!(head.apply("alice@corp.io"), "********rp.io");
    }

    #[test]
    fn test_mask_counts_chars_not_bytes() {
        let s = MaskStrategy::Mask {
            mask_char: '*',
            count: Some(2),
            from_end: false,
        };
        assert_eq!(s.apply("émile"), "**ile");
    }

    #[test]
    fn test_mask_count_exceeding_length_masks_everything() {
        let s = MaskStrategy::Mask {
            mask_char: '*',
            count: Some(100),
            from_end: true,
        };
        assert_eq!(s.apply("ab"), "**");
    }

    #[test]
    fn test_keep_passes_through() {
        assert_eq!(MaskStrategy::Keep.apply("value"), "value");
    }

    #[test]
    fn test_validation_rejects_bad_configs() {
        assert!(MaskStrategy::Replace {
            replacement: String::new()
        }
        .validate()
        .is_err());
        assert!(MaskStrategy::Hash {
            salt: "s".to_string(),
            keep: 2
        }
        .validate()
        .is_err());
        assert!(MaskStrategy::Mask {
            mask_char: '*',
            count: Some(0),
            from_end: false
        }
        .validate()
        .is_err());
        assert!(MaskStrategy::Mask {
            mask_char: '\n',
            count: None,
            from_end: false
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_strategy_toml_round_trip() {
        let s: MaskStrategy = toml::from_str(
            r##"
            type = "mask"
            mask_char = "#"
            count = 4
            from_end = true
            "##,
        )
        .unwrap();
        assert_eq!(
            s,
            MaskStrategy::Mask {
                mask_char: '#',
                count: Some(4),
                from_end: true
            }
        );
    }
}
