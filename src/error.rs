//! SafeScrub error types

use thiserror::Error;

/// SafeScrub error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pattern compilation or registration error
    #[error("Pattern error: {0}")]
    Pattern(String),

    /// Detection error
    #[error("Detection error: {0}")]
    Detection(String),

    /// Masking rule error
    #[error("Rule error: {0}")]
    Rule(String),

    /// Anonymization error
    #[error("Anonymization error: {0}")]
    Anonymization(String),

    /// Leakage scan error
    #[error("Leakage error: {0}")]
    Leakage(String),

    /// Classification error
    #[error("Classification error: {0}")]
    Classification(String),

    /// Batch processing error
    #[error("Batch error: {0}")]
    Batch(String),

    /// Operation timed out
    #[error("Timeout after {0}s")]
    Timeout(u64),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for SafeScrub operations
pub type Result<T> = std::result::Result<T, Error>;
