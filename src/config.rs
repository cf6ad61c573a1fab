//! SafeScrub configuration management

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Main SafeScrub configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrubConfig {
    /// Detection configuration
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Batch processing configuration
    #[serde(default)]
    pub batch: BatchConfig,

    /// Leakage prevention configuration
    #[serde(default)]
    pub leakage: LeakageConfig,

    /// Event sink configuration
    #[serde(default)]
    pub sinks: SinkConfig,
}

/// Detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Minimum confidence for a finding to be reported
    pub min_confidence: f64,

    /// Enable the deep analyzer pass in addition to pattern matching
    pub deep_analysis: bool,

    /// Scan cache capacity (entries). 0 disables the cache.
    pub cache_size: usize,

    /// Chunk size for oversized payloads, in KiB
    pub chunk_size_kb: usize,

    /// Overlap carried between adjacent chunks, in bytes
    pub overlap_chars: usize,

    /// Per-unit detection timeout in seconds
    pub detection_timeout_seconds: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            deep_analysis: true,
            cache_size: 1024,
            chunk_size_kb: 64,
            overlap_chars: 256,
            detection_timeout_seconds: 30,
        }
    }
}

/// Batch processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Units per sub-batch
    pub batch_size: usize,

    /// Maximum units processed concurrently
    pub max_concurrent_operations: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            max_concurrent_operations: 8,
        }
    }
}

/// Leakage prevention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeakageConfig {
    /// Treat critical-severity findings as high risk regardless of count
    pub strict_mode: bool,

    /// Block exports at or above the blocking threshold without operator override
    pub auto_block: bool,

    /// Minimum confidence for a finding to count toward risk scoring
    pub detection_threshold: f64,

    /// Fraction of payload bytes findings may cover before risk is raised
    pub allowed_exposure_ratio: f64,
}

impl Default for LeakageConfig {
    fn default() -> Self {
        Self {
            strict_mode: true,
            auto_block: true,
            detection_threshold: 0.5,
            allowed_exposure_ratio: 0.05,
        }
    }
}

/// Event sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Audit channel capacity. 0 disables the audit sink.
    pub audit_capacity: usize,

    /// Alert channel capacity. 0 disables the alert sink.
    pub alert_capacity: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            audit_capacity: 256,
            alert_capacity: 64,
        }
    }
}

impl ScrubConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.detection.min_confidence) {
            return Err(Error::Config(
                "detection.min_confidence must be within [0.0, 1.0]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.leakage.detection_threshold) {
            return Err(Error::Config(
                "leakage.detection_threshold must be within [0.0, 1.0]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.leakage.allowed_exposure_ratio) {
            return Err(Error::Config(
                "leakage.allowed_exposure_ratio must be within [0.0, 1.0]".to_string(),
            ));
        }
        if self.detection.chunk_size_kb == 0 {
            return Err(Error::Config(
                "detection.chunk_size_kb must be positive".to_string(),
            ));
        }
        if self.detection.overlap_chars >= self.detection.chunk_size_kb * 1024 {
            return Err(Error::Config(
                "detection.overlap_chars must be smaller than the chunk size".to_string(),
            ));
        }
        if self.batch.batch_size == 0 {
            return Err(Error::Config("batch.batch_size must be positive".to_string()));
        }
        if self.batch.max_concurrent_operations == 0 {
            return Err(Error::Config(
                "batch.max_concurrent_operations must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Chunk size in bytes
    pub fn chunk_size_bytes(&self) -> usize {
        self.detection.chunk_size_kb * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ScrubConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detection.chunk_size_kb, 64);
        assert!(config.leakage.auto_block);
    }

    #[test]
    fn test_invalid_confidence_rejected() {
        let mut config = ScrubConfig::default();
        config.detection.min_confidence = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overlap_must_fit_chunk() {
        let mut config = ScrubConfig::default();
        config.detection.chunk_size_kb = 1;
        config.detection.overlap_chars = 2048;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("safescrub.toml");
        std::fs::write(&path, toml::to_string(&ScrubConfig::default()).unwrap()).unwrap();
        let loaded = ScrubConfig::from_file(&path).unwrap();
        assert_eq!(loaded.batch.batch_size, 32);
    }

    #[test]
    fn test_from_file_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[detection]\nmin_confidence = 2.0\n").unwrap();
        assert!(ScrubConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ScrubConfig = toml::from_str(
            r#"
            [leakage]
            strict_mode = false
            auto_block = false
            detection_threshold = 0.7
            allowed_exposure_ratio = 0.1
            "#,
        )
        .unwrap();
        assert!(!config.leakage.strict_mode);
        assert_eq!(config.detection.cache_size, 1024);
        assert_eq!(config.batch.batch_size, 32);
    }
}
