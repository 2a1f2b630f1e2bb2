//! Lightweight in-process counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::policy::Outcome;

/// Atomic counters for decision outcomes and subsystem events.
#[derive(Debug, Default)]
pub struct Telemetry {
    allowed: AtomicU64,
    alerted: AtomicU64,
    redacted: AtomicU64,
    refused: AtomicU64,
    denied: AtomicU64,
    evaluation_errors: AtomicU64,
    canary_triggers: AtomicU64,
    alerts_dispatched: AtomicU64,
    dispatch_failures: AtomicU64,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Allow outcomes recorded
    pub allowed: u64,
    /// Alert outcomes recorded
    pub alerted: u64,
    /// Redact outcomes recorded
    pub redacted: u64,
    /// Refuse outcomes recorded
    pub refused: u64,
    /// Deny outcomes recorded
    pub denied: u64,
    /// Rule evaluation errors resolved by enforcement mode
    pub evaluation_errors: u64,
    /// Canary firings
    pub canary_triggers: u64,
    /// Alert deliveries that eventually succeeded
    pub alerts_dispatched: u64,
    /// Alert deliveries that exhausted retries
    pub dispatch_failures: u64,
}

impl Telemetry {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decision outcome.
    pub fn record_outcome(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Allow => &self.allowed,
            Outcome::Alert => &self.alerted,
            Outcome::Redact => &self.redacted,
            Outcome::Refuse => &self.refused,
            Outcome::Deny => &self.denied,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an evaluation error resolved by the enforcement mode.
    pub fn record_evaluation_error(&self) {
        self.evaluation_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a canary firing.
    pub fn record_canary_trigger(&self) {
        self.canary_triggers.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful alert delivery.
    pub fn record_alert_dispatched(&self) {
        self.alerts_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an alert delivery that exhausted its retries.
    pub fn record_dispatch_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            allowed: self.allowed.load(Ordering::Relaxed),
            alerted: self.alerted.load(Ordering::Relaxed),
            redacted: self.redacted.load(Ordering::Relaxed),
            refused: self.refused.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            evaluation_errors: self.evaluation_errors.load(Ordering::Relaxed),
            canary_triggers: self.canary_triggers.load(Ordering::Relaxed),
            alerts_dispatched: self.alerts_dispatched.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
        }
    }
}
