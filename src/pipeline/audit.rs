//! Append-only audit trail.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::Decision;
use crate::policy::{Outcome, Stage};

/// One audited decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Record identifier
    pub id: String,
    /// When the decision was made
    pub timestamp: DateTime<Utc>,
    /// The stage that decided
    pub stage: Stage,
    /// The outcome
    pub outcome: Outcome,
    /// The matched rule, if any
    pub matched_rule_id: Option<String>,
    /// The decision's reason
    pub reason: String,
    /// Identity of the requesting subject
    pub subject_identity: String,
    /// Session identifier
    pub session_id: String,
    /// Free-form context (canary id, chunk counts, trigger mode)
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Query filter over the trail. All set fields must match.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Restrict to one stage
    pub stage: Option<Stage>,
    /// Restrict to one outcome
    pub outcome: Option<Outcome>,
    /// Only records at or after this time
    pub since: Option<DateTime<Utc>>,
    /// At most this many records, newest first
    pub limit: Option<usize>,
}

/// In-memory append-only store of decisions.
#[derive(Default)]
pub struct AuditTrail {
    records: RwLock<Vec<AuditRecord>>,
}

impl AuditTrail {
    /// Create an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decision.
    pub fn record(&self, decision: &Decision, subject_identity: &str, session_id: &str) {
        self.record_with_metadata(decision, subject_identity, session_id, HashMap::new());
    }

    /// Append a decision with extra context.
    pub fn record_with_metadata(
        &self,
        decision: &Decision,
        subject_identity: &str,
        session_id: &str,
        metadata: HashMap<String, String>,
    ) {
        let record = AuditRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: decision.timestamp,
            stage: decision.stage,
            outcome: decision.outcome,
            matched_rule_id: decision.matched_rule_id.clone(),
            reason: decision.reason.clone(),
            subject_identity: subject_identity.to_string(),
            session_id: session_id.to_string(),
            metadata,
        };
        self.records.write().push(record);
    }

    /// Records matching the filter, newest first.
    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditRecord> {
        let records = self.records.read();
        let mut matched: Vec<AuditRecord> = records
            .iter()
            .rev()
            .filter(|r| filter.stage.map_or(true, |s| r.stage == s))
            .filter(|r| filter.outcome.map_or(true, |o| r.outcome == o))
            .filter(|r| filter.since.map_or(true, |t| r.timestamp >= t))
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        matched
    }

    /// Total records held.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the trail is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
