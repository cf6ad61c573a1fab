//! Entity detection
//!
//! The detection pipeline is layered:
//!
//! ```text
//!   text ──► PatternCatalog (regex + validators, cached per pattern)
//!        ──► DeepAnalyzer   (context-aware second pass, optional)
//!        ──► merge/dedup    (overlaps collapse to highest confidence)
//! ```
//!
//! Oversized payloads go through the chunker, which splits on UTF-8
//! boundaries with overlap and rebases offsets back to the full text.

pub mod analyzer;
pub mod cache;
pub mod chunker;
pub mod detector;
pub mod patterns;

pub use analyzer::{ContextAnalyzer, DeepAnalyzer};
pub use cache::ScanCache;
pub use chunker::ChunkScanner;
pub use detector::EntityDetector;
pub use patterns::PatternCatalog;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Severity of an entity type, fixed per type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Kinds of sensitive entities the engine recognizes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Email,
    Phone,
    CreditCard,
    NationalId,
    IpAddress,
    MacAddress,
    Iban,
    ApiKey,
    CredentialHash,
    Password,
    Url,
    DateOfBirth,
    PersonName,
    /// High-entropy token with no matching pattern, a likely secret
    GenericSecret,
    /// Operator-registered custom pattern
    Custom(String),
}

impl EntityType {
    /// Fixed severity of this entity type
    pub fn severity(&self) -> Severity {
        match self {
            EntityType::CreditCard
            | EntityType::NationalId
            | EntityType::Password
            | EntityType::ApiKey => Severity::Critical,
            EntityType::Email
            | EntityType::Iban
            | EntityType::CredentialHash
            | EntityType::DateOfBirth
            | EntityType::GenericSecret => Severity::High,
            EntityType::Phone
            | EntityType::IpAddress
            | EntityType::MacAddress
            | EntityType::PersonName
            | EntityType::Custom(_) => Severity::Medium,
            EntityType::Url => Severity::Low,
        }
    }

    /// Stable uppercase label, used in redaction tokens and reports
    pub fn label(&self) -> String {
        match self {
            EntityType::Email => "EMAIL".to_string(),
            EntityType::Phone => "PHONE".to_string(),
            EntityType::CreditCard => "CREDIT_CARD".to_string(),
            EntityType::NationalId => "NATIONAL_ID".to_string(),
            EntityType::IpAddress => "IP_ADDRESS".to_string(),
            EntityType::MacAddress => "MAC_ADDRESS".to_string(),
            EntityType::Iban => "IBAN".to_string(),
            EntityType::ApiKey => "API_KEY".to_string(),
            EntityType::CredentialHash => "CREDENTIAL_HASH".to_string(),
            EntityType::Password => "PASSWORD".to_string(),
            EntityType::Url => "URL".to_string(),
            EntityType::DateOfBirth => "DATE_OF_BIRTH".to_string(),
            EntityType::PersonName => "PERSON_NAME".to_string(),
            EntityType::GenericSecret => "GENERIC_SECRET".to_string(),
            EntityType::Custom(name) => name.to_uppercase(),
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// How a finding was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Pattern,
    DeepAnalysis,
    NameHeuristic,
    Entropy,
}

/// A single detected entity within a payload
///
/// Offsets are byte offsets into the scanned text and always fall on
/// UTF-8 character boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpan {
    /// Entity kind
    pub entity_type: EntityType,

    /// Byte offset of the first matched byte
    pub start: usize,

    /// Byte offset one past the last matched byte
    pub end: usize,

    /// The matched text itself
    pub matched_text: String,

    /// Detector confidence in [0.0, 1.0]
    pub confidence: f64,

    /// Producing method
    pub method: DetectionMethod,

    /// Catalog pattern that fired, when method is Pattern
    pub pattern_id: Option<String>,

    /// Free-form annotations (entropy values, validator notes)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl EntitySpan {
    /// Whether two spans cover overlapping byte ranges
    pub fn overlaps(&self, other: &EntitySpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}
