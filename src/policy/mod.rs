//! Policy data structures and representations.
//!
//! This module defines the rule model shared by all four enforcement stages:
//! rules, conditions, masking/leakage rules for the output stage, and the
//! ordered rule sets they live in.

mod condition;
mod document;
mod masking;
mod rule;

pub use condition::{
    AttributeValue, Condition, ConditionOperator, ConditionValue, ValueType,
};
pub(crate) use condition::ip_in_cidr;
pub use document::RuleSetDocument;
pub use masking::{LeakageAction, LeakageRule, MaskingRule};
pub use rule::{LogicalOperator, Rule, RuleAction, RuleBuilder};

use serde::{Deserialize, Serialize};

/// The four enforcement stages of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Prompt firewall over the raw query text
    PromptFirewall,
    /// Retrieval filter over candidate document chunks
    Retrieval,
    /// Output sanitizer over the generated response
    Output,
    /// Standalone ABAC gate for non-query authorization checks
    AbacGate,
}

impl Stage {
    /// Lowercase name used in logs and alert payloads.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::PromptFirewall => "prompt_firewall",
            Stage::Retrieval => "retrieval",
            Stage::Output => "output",
            Stage::AbacGate => "abac_gate",
        }
    }
}

/// Enforcement outcome of a stage or pipeline decision.
///
/// Variant order defines the severity ordering used for aggregation:
/// `Deny > Refuse > Redact > Alert > Allow`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Request proceeds unchanged
    Allow,
    /// Request proceeds; an alert is raised
    Alert,
    /// Matched content was removed or replaced
    Redact,
    /// The whole response was replaced with a refusal message
    Refuse,
    /// Request is blocked
    Deny,
}

impl Outcome {
    /// Whether the request may proceed under this outcome.
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Outcome::Deny | Outcome::Refuse)
    }

    /// Lowercase name used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Outcome::Allow => "allow",
            Outcome::Alert => "alert",
            Outcome::Redact => "redact",
            Outcome::Refuse => "refuse",
            Outcome::Deny => "deny",
        }
    }
}

/// Severity carried on rules and propagated unchanged into alerts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Low,
    /// Medium severity
    Medium,
    /// High severity
    High,
    /// Critical severity (canary triggers, refusals)
    Critical,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

/// The default decision applied when no rule in a rule set matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    /// Deny by default: fail closed
    Strict,
    /// Allow by default: fail open, but flagged on evaluation errors
    Permissive,
}

impl Default for EnforcementMode {
    fn default() -> Self {
        EnforcementMode::Strict
    }
}

/// An ordered, independently toggle-able collection of rules sharing one
/// stage. Rules are totally ordered by `order_index`; evaluation is
/// first-match-wins, so order is significant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    /// The stage all rules in this set belong to
    pub stage: Stage,
    /// Default decision when no rule matches
    #[serde(default)]
    pub mode: EnforcementMode,
    /// Rules, kept sorted by `order_index`
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Create an empty rule set for the given stage.
    pub fn new(stage: Stage, mode: EnforcementMode) -> Self {
        Self {
            stage,
            mode,
            rules: Vec::new(),
        }
    }

    /// Add a rule, keeping `order_index` order. Fails if the rule is invalid,
    /// belongs to a different stage, or reuses an existing ID.
    pub fn add_rule(&mut self, rule: Rule) -> crate::Result<()> {
        rule.validate()?;
        if rule.stage != self.stage {
            return Err(crate::Error::validation(format!(
                "Rule '{}' targets stage {} but the set is for {}",
                rule.id,
                rule.stage.name(),
                self.stage.name()
            )));
        }
        if self.rules.iter().any(|r| r.id == rule.id) {
            return Err(crate::Error::validation_field(
                format!("Duplicate rule ID '{}'", rule.id),
                "id",
            ));
        }
        self.rules.push(rule);
        self.rules.sort_by_key(|r| r.order_index);
        Ok(())
    }

    /// Replace an existing rule by ID.
    pub fn replace_rule(&mut self, rule: Rule) -> crate::Result<()> {
        rule.validate()?;
        let pos = self
            .rules
            .iter()
            .position(|r| r.id == rule.id)
            .ok_or_else(|| {
                crate::Error::validation(format!("Rule not found: {}", rule.id))
            })?;
        self.rules.remove(pos);
        self.rules.push(rule);
        self.rules.sort_by_key(|r| r.order_index);
        Ok(())
    }

    /// Remove a rule by ID.
    pub fn delete_rule(&mut self, rule_id: &str) -> crate::Result<()> {
        let pos = self
            .rules
            .iter()
            .position(|r| r.id == rule_id)
            .ok_or_else(|| {
                crate::Error::validation(format!("Rule not found: {}", rule_id))
            })?;
        self.rules.remove(pos);
        Ok(())
    }

    /// Flip the enabled flag of a rule by ID. Returns the new state.
    pub fn toggle_rule(&mut self, rule_id: &str) -> crate::Result<bool> {
        let rule = self
            .rules
            .iter_mut()
            .find(|r| r.id == rule_id)
            .ok_or_else(|| {
                crate::Error::validation(format!("Rule not found: {}", rule_id))
            })?;
        rule.enabled = !rule.enabled;
        Ok(rule.enabled)
    }

    /// Enabled rules in `order_index` order.
    pub fn enabled_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.enabled)
    }

    /// Validate every rule in the set.
    pub fn validate(&self) -> crate::Result<()> {
        for rule in &self.rules {
            rule.validate()?;
            if rule.stage != self.stage {
                return Err(crate::Error::validation(format!(
                    "Rule '{}' targets stage {} but the set is for {}",
                    rule.id,
                    rule.stage.name(),
                    self.stage.name()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_severity_ordering() {
        assert!(Outcome::Deny > Outcome::Refuse);
        assert!(Outcome::Refuse > Outcome::Redact);
        assert!(Outcome::Redact > Outcome::Alert);
        assert!(Outcome::Alert > Outcome::Allow);
    }

    #[test]
    fn test_rule_set_keeps_order_index_order() {
        let mut set = RuleSet::new(Stage::AbacGate, EnforcementMode::Strict);
        set.add_rule(
            Rule::builder("r-second")
                .stage(Stage::AbacGate)
                .condition(Condition::equals("subject.department", "hr"))
                .action(RuleAction::Deny)
                .order_index(20)
                .build()
                .unwrap(),
        )
        .unwrap();
        set.add_rule(
            Rule::builder("r-first")
                .stage(Stage::AbacGate)
                .condition(Condition::equals("subject.department", "hr"))
                .action(RuleAction::Allow)
                .order_index(10)
                .build()
                .unwrap(),
        )
        .unwrap();

        let ids: Vec<_> = set.rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r-first", "r-second"]);
    }

    #[test]
    fn test_duplicate_rule_id_rejected() {
        let mut set = RuleSet::new(Stage::AbacGate, EnforcementMode::Strict);
        let rule = Rule::builder("r-1")
            .stage(Stage::AbacGate)
            .condition(Condition::equals("subject.department", "hr"))
            .action(RuleAction::Allow)
            .build()
            .unwrap();
        set.add_rule(rule.clone()).unwrap();
        assert!(set.add_rule(rule).is_err());
    }

    #[test]
    fn test_stage_mismatch_rejected() {
        let mut set = RuleSet::new(Stage::Retrieval, EnforcementMode::Strict);
        let rule = Rule::builder("r-1")
            .stage(Stage::AbacGate)
            .condition(Condition::equals("subject.department", "hr"))
            .action(RuleAction::Allow)
            .build()
            .unwrap();
        assert!(set.add_rule(rule).is_err());
    }

    #[test]
    fn test_toggle_rule() {
        let mut set = RuleSet::new(Stage::AbacGate, EnforcementMode::Strict);
        set.add_rule(
            Rule::builder("r-1")
                .stage(Stage::AbacGate)
                .condition(Condition::equals("subject.department", "hr"))
                .action(RuleAction::Allow)
                .build()
                .unwrap(),
        )
        .unwrap();

        assert!(!set.toggle_rule("r-1").unwrap());
        assert_eq!(set.enabled_rules().count(), 0);
        assert!(set.toggle_rule("r-1").unwrap());
        assert_eq!(set.enabled_rules().count(), 1);
    }
}
