//! Audit and alert event sinks
//!
//! Sinks are bounded, lossy, and strictly non-blocking: events are
//! delivered with `try_send`, and a full or closed channel drops the
//! event with a warning. A scan never fails or stalls because nobody
//! is draining events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::config::SinkConfig;
use crate::leakage::RiskLevel;

/// Record of one engine operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    /// Operation name (scan, mask, prevent_export, classify)
    pub operation: String,
    pub entity_count: usize,
    pub risk_level: Option<RiskLevel>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(operation: &str, entity_count: usize, risk_level: Option<RiskLevel>, duration_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation: operation.to_string(),
            entity_count,
            risk_level,
            duration_ms,
            timestamp: Utc::now(),
        }
    }
}

/// High-risk notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub risk_level: RiskLevel,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

impl AlertEvent {
    pub fn new(risk_level: RiskLevel, summary: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            risk_level,
            summary: summary.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Emission side of the audit/alert channels
pub struct EventSinks {
    audit: Option<mpsc::Sender<AuditEvent>>,
    alert: Option<mpsc::Sender<AlertEvent>>,
    dropped: AtomicU64,
}

impl EventSinks {
    /// Build sinks per config, returning receivers for the enabled
    /// channels. Capacity 0 disables a channel.
    pub fn new(
        config: &SinkConfig,
    ) -> (
        Self,
        Option<mpsc::Receiver<AuditEvent>>,
        Option<mpsc::Receiver<AlertEvent>>,
    ) {
        let (audit, audit_rx) = match config.audit_capacity {
            0 => (None, None),
            cap => {
                let (tx, rx) = mpsc::channel(cap);
                (Some(tx), Some(rx))
            }
        };
        let (alert, alert_rx) = match config.alert_capacity {
            0 => (None, None),
            cap => {
                let (tx, rx) = mpsc::channel(cap);
                (Some(tx), Some(rx))
            }
        };
        (
            Self {
                audit,
                alert,
                dropped: AtomicU64::new(0),
            },
            audit_rx,
            alert_rx,
        )
    }

    /// Sinks that discard everything
    pub fn disabled() -> Self {
        Self {
            audit: None,
            alert: None,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn emit_audit(&self, event: AuditEvent) {
        if let Some(tx) = &self.audit {
            if let Err(e) = tx.try_send(event) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "audit event dropped");
            }
        }
    }

    pub fn emit_alert(&self, event: AlertEvent) {
        if let Some(tx) = &self.alert {
            if let Err(e) = tx.try_send(event) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "alert event dropped");
            }
        }
    }

    /// Events lost to full or closed channels
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
