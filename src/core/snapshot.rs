//! Immutable, pre-compiled rule snapshots.
//!
//! Rule mutations build a fresh snapshot and swap it in atomically, so
//! in-flight evaluations always see one consistent rule set and regexes are
//! compiled exactly once per load rather than per evaluation.

use regex::Regex;

use crate::policy::{
    Condition, ConditionOperator, ConditionValue, EnforcementMode, LeakageRule, MaskingRule, Rule,
    RuleSet, Stage,
};
use crate::Result;

/// A condition with its regex (for `matches`) compiled ahead of time.
#[derive(Debug)]
pub struct CompiledCondition {
    /// The source condition
    pub condition: Condition,
    /// Compiled pattern when the operator is `matches`
    pub regex: Option<Regex>,
}

impl CompiledCondition {
    fn compile(condition: Condition) -> Result<Self> {
        let regex = match (&condition.operator, &condition.value) {
            (ConditionOperator::Matches, ConditionValue::String(pattern)) => {
                Some(Regex::new(pattern).map_err(|e| {
                    crate::Error::validation(format!("Invalid regex '{}': {}", pattern, e))
                })?)
            }
            _ => None,
        };
        Ok(Self { condition, regex })
    }
}

/// A rule with its text pattern and condition regexes compiled.
#[derive(Debug)]
pub struct CompiledRule {
    /// The source rule
    pub rule: Rule,
    /// Compiled text pattern, if the rule has one
    pub pattern: Option<Regex>,
    /// Compiled conditions, in rule order
    pub conditions: Vec<CompiledCondition>,
}

impl CompiledRule {
    fn compile(rule: Rule) -> Result<Self> {
        let pattern = match &rule.pattern {
            Some(p) => Some(Regex::new(p).map_err(|e| {
                crate::Error::validation(format!(
                    "Rule '{}' has an invalid pattern: {}",
                    rule.id, e
                ))
            })?),
            None => None,
        };
        let conditions = rule
            .conditions
            .iter()
            .cloned()
            .map(CompiledCondition::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            rule,
            pattern,
            conditions,
        })
    }
}

/// An immutable compiled view of one stage's rule set. Contains enabled
/// rules only, in `order_index` order.
#[derive(Debug)]
pub struct RuleSetSnapshot {
    /// The stage this snapshot serves
    pub stage: Stage,
    /// Default decision when no rule matches
    pub mode: EnforcementMode,
    /// Compiled enabled rules in evaluation order
    pub rules: Vec<CompiledRule>,
}

impl RuleSetSnapshot {
    /// Compile a snapshot from a rule set. Disabled rules are dropped here.
    pub fn compile(rule_set: &RuleSet) -> Result<Self> {
        let mut rules: Vec<CompiledRule> = rule_set
            .enabled_rules()
            .cloned()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>>>()?;
        rules.sort_by_key(|r| r.rule.order_index);
        Ok(Self {
            stage: rule_set.stage,
            mode: rule_set.mode,
            rules,
        })
    }

    /// An empty snapshot for a stage with no configured rules.
    pub fn empty(stage: Stage, mode: EnforcementMode) -> Self {
        Self {
            stage,
            mode,
            rules: Vec::new(),
        }
    }
}

/// A masking rule with its pattern compiled.
#[derive(Debug)]
pub struct CompiledMaskingRule {
    /// The source rule
    pub rule: MaskingRule,
    /// Compiled pattern
    pub pattern: Regex,
}

/// A leakage rule with its pattern compiled.
#[derive(Debug)]
pub struct CompiledLeakageRule {
    /// The source rule
    pub rule: LeakageRule,
    /// Compiled pattern
    pub pattern: Regex,
}

/// An immutable compiled view of the output-stage masking and leakage
/// rules. Swapped together with the output rule-set snapshot.
#[derive(Debug)]
pub struct OutputRuleSnapshot {
    /// Compiled enabled masking rules in order
    pub masking: Vec<CompiledMaskingRule>,
    /// Compiled enabled leakage rules in order
    pub leakage: Vec<CompiledLeakageRule>,
}

impl OutputRuleSnapshot {
    /// Compile a snapshot from the raw rule lists. Disabled rules are
    /// dropped here.
    pub fn compile(masking: &[MaskingRule], leakage: &[LeakageRule]) -> Result<Self> {
        let mut compiled_masking = Vec::new();
        for rule in masking.iter().filter(|r| r.enabled) {
            let pattern = Regex::new(&rule.pattern).map_err(|e| {
                crate::Error::validation(format!(
                    "Masking rule '{}' has an invalid pattern: {}",
                    rule.id, e
                ))
            })?;
            compiled_masking.push(CompiledMaskingRule {
                rule: rule.clone(),
                pattern,
            });
        }
        compiled_masking.sort_by_key(|r| r.rule.order_index);

        let mut compiled_leakage = Vec::new();
        for rule in leakage.iter().filter(|r| r.enabled) {
            let pattern = Regex::new(&rule.pattern).map_err(|e| {
                crate::Error::validation(format!(
                    "Leakage rule '{}' has an invalid pattern: {}",
                    rule.id, e
                ))
            })?;
            compiled_leakage.push(CompiledLeakageRule {
                rule: rule.clone(),
                pattern,
            });
        }
        compiled_leakage.sort_by_key(|r| r.rule.order_index);

        Ok(Self {
            masking: compiled_masking,
            leakage: compiled_leakage,
        })
    }

    /// An empty snapshot.
    pub fn empty() -> Self {
        Self {
            masking: Vec::new(),
            leakage: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RuleAction;

    #[test]
    fn test_snapshot_drops_disabled_rules() {
        let mut set = RuleSet::new(Stage::PromptFirewall, EnforcementMode::Permissive);
        set.add_rule(
            Rule::builder("fw-on")
                .stage(Stage::PromptFirewall)
                .pattern("attack")
                .action(RuleAction::Deny)
                .build()
                .unwrap(),
        )
        .unwrap();
        set.add_rule(
            Rule::builder("fw-off")
                .stage(Stage::PromptFirewall)
                .pattern("other")
                .action(RuleAction::Deny)
                .enabled(false)
                .build()
                .unwrap(),
        )
        .unwrap();

        let snapshot = RuleSetSnapshot::compile(&set).unwrap();
        assert_eq!(snapshot.rules.len(), 1);
        assert_eq!(snapshot.rules[0].rule.id, "fw-on");
    }

    #[test]
    fn test_snapshot_preserves_order() {
        let mut set = RuleSet::new(Stage::PromptFirewall, EnforcementMode::Strict);
        for (id, idx) in [("fw-c", 30u32), ("fw-a", 10), ("fw-b", 20)] {
            set.add_rule(
                Rule::builder(id)
                    .stage(Stage::PromptFirewall)
                    .pattern("x")
                    .action(RuleAction::Deny)
                    .order_index(idx)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        }
        let snapshot = RuleSetSnapshot::compile(&set).unwrap();
        let ids: Vec<_> = snapshot.rules.iter().map(|r| r.rule.id.as_str()).collect();
        assert_eq!(ids, vec!["fw-a", "fw-b", "fw-c"]);
    }

    #[test]
    fn test_output_snapshot_compiles() {
        let masking = vec![MaskingRule::new("m-1", r"\d{16}", "<card>").unwrap()];
        let leakage = vec![LeakageRule::new(
            "lk-1",
            "jwt",
            r"eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+",
            crate::policy::LeakageAction::Redact,
        )
        .unwrap()];
        let snapshot = OutputRuleSnapshot::compile(&masking, &leakage).unwrap();
        assert_eq!(snapshot.masking.len(), 1);
        assert_eq!(snapshot.leakage.len(), 1);
    }
}
