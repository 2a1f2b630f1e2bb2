//! Rule definition and builder.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Condition, Severity, Stage};
use crate::{Error, Result};

/// Action taken when a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Permit and stop evaluating further rules
    Allow,
    /// Block and stop evaluating further rules
    Deny,
    /// Permit, raise an alert, and stop evaluating further rules
    Alert,
}

impl RuleAction {
    /// Lowercase name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            RuleAction::Allow => "allow",
            RuleAction::Deny => "deny",
            RuleAction::Alert => "alert",
        }
    }
}

/// How a rule's conditions combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    /// All conditions must hold
    And,
    /// At least one condition must hold
    Or,
}

impl Default for LogicalOperator {
    fn default() -> Self {
        LogicalOperator::And
    }
}

/// A single enforcement rule.
///
/// Prompt-firewall and output-stage rules match on `pattern`; retrieval and
/// ABAC rules match on `conditions`. A rule may carry both, in which case
/// both must hold for the rule to match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Unique rule identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
    /// Stage this rule belongs to
    pub stage: Stage,
    /// Regex pattern over the stage's text input, if any
    #[serde(default)]
    pub pattern: Option<String>,
    /// Attribute conditions, if any
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// How the conditions combine
    #[serde(default)]
    pub logical_operator: LogicalOperator,
    /// Action taken when the rule matches
    pub action: RuleAction,
    /// Severity propagated into alerts raised by this rule
    #[serde(default)]
    pub severity: Severity,
    /// Disabled rules are skipped during evaluation
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Position within the rule set; evaluation order
    #[serde(default)]
    pub order_index: u32,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    /// Start building a rule with the given ID.
    pub fn builder(id: impl Into<String>) -> RuleBuilder {
        RuleBuilder::new(id)
    }

    /// Validate the rule: it must have a match criterion, a compilable
    /// pattern if one is set, and well-formed conditions.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::validation_field("Rule ID cannot be empty", "id"));
        }
        if self.pattern.is_none() && self.conditions.is_empty() {
            return Err(Error::validation(format!(
                "Rule '{}' has neither a pattern nor conditions",
                self.id
            )));
        }
        if let Some(pattern) = &self.pattern {
            regex::Regex::new(pattern).map_err(|e| {
                Error::validation_field(
                    format!("Rule '{}' has an invalid pattern: {}", self.id, e),
                    "pattern",
                )
            })?;
        }
        for condition in &self.conditions {
            condition.validate()?;
        }
        Ok(())
    }
}

/// Builder for [`Rule`].
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    id: String,
    name: Option<String>,
    description: Option<String>,
    stage: Option<Stage>,
    pattern: Option<String>,
    conditions: Vec<Condition>,
    logical_operator: LogicalOperator,
    action: Option<RuleAction>,
    severity: Severity,
    enabled: bool,
    order_index: u32,
}

impl RuleBuilder {
    /// Create a builder with the given rule ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            stage: None,
            pattern: None,
            conditions: Vec::new(),
            logical_operator: LogicalOperator::And,
            action: None,
            severity: Severity::default(),
            enabled: true,
            order_index: 0,
        }
    }

    /// Create a builder with a random UUID for the rule ID.
    pub fn with_random_id() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Set the human-readable name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the stage.
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Set the regex pattern.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Add a condition.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Set how conditions combine.
    pub fn logical_operator(mut self, op: LogicalOperator) -> Self {
        self.logical_operator = op;
        self
    }

    /// Set the action.
    pub fn action(mut self, action: RuleAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Set the severity.
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set the enabled flag.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the evaluation order position.
    pub fn order_index(mut self, order_index: u32) -> Self {
        self.order_index = order_index;
        self
    }

    /// Build and validate the rule.
    pub fn build(self) -> Result<Rule> {
        let stage = self
            .stage
            .ok_or_else(|| Error::validation_field("Rule stage is required", "stage"))?;
        let action = self
            .action
            .ok_or_else(|| Error::validation_field("Rule action is required", "action"))?;
        let rule = Rule {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            description: self.description,
            stage,
            pattern: self.pattern,
            conditions: self.conditions,
            logical_operator: self.logical_operator,
            action,
            severity: self.severity,
            enabled: self.enabled,
            order_index: self.order_index,
        };
        rule.validate()?;
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_pattern_rule() {
        let rule = Rule::builder("fw-ignore")
            .name("Instruction override")
            .stage(Stage::PromptFirewall)
            .pattern(r"ignore\s+previous\s+instructions")
            .action(RuleAction::Deny)
            .severity(Severity::High)
            .build()
            .unwrap();
        assert!(rule.enabled);
        assert_eq!(rule.action, RuleAction::Deny);
    }

    #[test]
    fn test_rule_requires_match_criterion() {
        let err = Rule::builder("empty")
            .stage(Stage::AbacGate)
            .action(RuleAction::Allow)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("neither a pattern nor conditions"));
    }

    #[test]
    fn test_invalid_pattern_rejected_at_build() {
        let err = Rule::builder("bad-regex")
            .stage(Stage::PromptFirewall)
            .pattern(r"unclosed(group")
            .action(RuleAction::Deny)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_missing_stage_rejected() {
        let err = Rule::builder("no-stage")
            .pattern("x")
            .action(RuleAction::Allow)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}
