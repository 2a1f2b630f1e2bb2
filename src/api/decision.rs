//! Decision types returned by stage evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::{Outcome, Severity, Stage};

/// The result of evaluating one stage against one input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// The enforcement outcome
    pub outcome: Outcome,
    /// The stage that produced this decision
    pub stage: Stage,
    /// ID of the rule that matched, if any
    pub matched_rule_id: Option<String>,
    /// Human-readable explanation
    pub reason: String,
    /// Severity of the matched rule, if any
    pub severity: Option<Severity>,
    /// When the decision was made
    pub timestamp: DateTime<Utc>,
}

impl Decision {
    /// A decision produced by a matched rule.
    pub fn matched(
        outcome: Outcome,
        stage: Stage,
        rule_id: impl Into<String>,
        reason: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            outcome,
            stage,
            matched_rule_id: Some(rule_id.into()),
            reason: reason.into(),
            severity: Some(severity),
            timestamp: Utc::now(),
        }
    }

    /// A default decision produced when no rule matched.
    pub fn unmatched(outcome: Outcome, stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            outcome,
            stage,
            matched_rule_id: None,
            reason: reason.into(),
            severity: None,
            timestamp: Utc::now(),
        }
    }

    /// Whether the input may proceed under this decision.
    pub fn is_allowed(&self) -> bool {
        self.outcome.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matched_decision() {
        let d = Decision::matched(
            Outcome::Deny,
            Stage::PromptFirewall,
            "fw-1",
            "injection pattern matched",
            Severity::High,
        );
        assert!(!d.is_allowed());
        assert_eq!(d.matched_rule_id.as_deref(), Some("fw-1"));
    }

    #[test]
    fn test_unmatched_decision() {
        let d = Decision::unmatched(Outcome::Allow, Stage::AbacGate, "no matching deny rule");
        assert!(d.is_allowed());
        assert!(d.matched_rule_id.is_none());
        assert!(d.severity.is_none());
    }
}
