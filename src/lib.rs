//! SafeScrub - PII detection, masking, and leakage prevention engine
//!
//! SafeScrub scans text and JSON payloads for personal and secret data,
//! rewrites what it finds under configurable masking rules, scores
//! payloads for leakage risk, and gates exports on that risk.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                         ScrubEngine                            │
//! │                                                                │
//! │  ┌──────────────────────────────────────────────────────────┐  │
//! │  │                     Detection                             │  │
//! │  │  ┌─────────────┐  ┌────────────┐  ┌──────────────────┐   │  │
//! │  │  │  Pattern    │  │   Scan     │  │  Deep Analyzer   │   │  │
//! │  │  │  Catalog    │──│   Cache    │──│  (context pass)  │   │  │
//! │  │  └─────────────┘  └────────────┘  └──────────────────┘   │  │
//! │  │            chunked scanning for oversized payloads        │  │
//! │  └──────────────────────────┬───────────────────────────────┘  │
//! │                             │ findings                          │
//! │        ┌────────────────────┼─────────────────────┐            │
//! │        ▼                    ▼                     ▼            │
//! │  ┌───────────┐      ┌──────────────┐      ┌──────────────┐    │
//! │  │  Masking  │      │   Leakage    │      │  Classifier  │    │
//! │  │  rules +  │      │  scorer +    │      │  fields and  │    │
//! │  │ anonymizer│      │ export gate  │      │   datasets   │    │
//! │  └───────────┘      └──────────────┘      └──────────────┘    │
//! │                                                                │
//! │        audit / alert sinks          batch processor            │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Properties
//!
//! - Detection never fails a scan: analyzer errors, chunk timeouts, and
//!   batch unit failures are isolated and logged.
//! - Masking rewrites by descending offset, so reported spans always
//!   address the original payload.
//! - Leakage scoring is fail-safe: internal errors report high risk
//!   instead of a silent pass.
//! - Whitelisted values are removed before aggregation and can never
//!   raise risk.
//!
//! ## Modules
//!
//! - [`detect`]: pattern catalog, scan cache, deep analysis, chunking
//! - [`mask`]: strategies, rules, and the anonymizer
//! - [`leakage`]: risk scoring, prevention policies, export gating
//! - [`classify`]: field and dataset classification
//! - [`batch`]: bounded concurrent batch scanning
//! - [`sink`]: non-blocking audit and alert events
//! - [`engine`]: the facade wiring it all together

pub mod batch;
pub mod classify;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod leakage;
pub mod mask;
pub mod sink;

pub use config::ScrubConfig;
pub use engine::{ScanPayload, ScrubEngine};
pub use error::{Error, Result};
