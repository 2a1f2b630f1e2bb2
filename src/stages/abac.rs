//! Standalone ABAC gate.
//!
//! Authorizes non-query operations (document upload, deletion, admin
//! actions) against the gate's rule set. The requested action is injected
//! into the object attributes so rules can condition on it.

use crate::api::{AttributeContext, Decision};
use crate::core::{evaluate, RuleSetSnapshot};
use crate::policy::AttributeValue;

/// Object attribute key carrying the requested action.
pub const ACTION_ATTRIBUTE: &str = "action";

/// Check whether the subject may perform an action.
pub fn check_action(snapshot: &RuleSetSnapshot, ctx: &AttributeContext, action: &str) -> Decision {
    let mut object = ctx.object.clone();
    object.insert(
        ACTION_ATTRIBUTE.to_string(),
        AttributeValue::String(action.to_string()),
    );
    let gate_ctx = ctx.with_object(object);
    evaluate(snapshot, None, &gate_ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{
        Condition, EnforcementMode, Outcome, Rule, RuleAction, RuleSet, Stage,
    };

    fn snapshot(mode: EnforcementMode, rules: Vec<Rule>) -> RuleSetSnapshot {
        let mut set = RuleSet::new(Stage::AbacGate, mode);
        for rule in rules {
            set.add_rule(rule).unwrap();
        }
        RuleSetSnapshot::compile(&set).unwrap()
    }

    #[test]
    fn test_action_condition() {
        let rules = vec![Rule::builder("gate-delete-admins")
            .stage(Stage::AbacGate)
            .condition(Condition::equals("object.action", "delete_document"))
            .condition(Condition::is_in(
                "subject.role",
                vec!["admin".to_string(), "owner".to_string()],
            ))
            .action(RuleAction::Allow)
            .build()
            .unwrap()];
        let snapshot = snapshot(EnforcementMode::Strict, rules);

        let admin = AttributeContext::builder().subject("role", "admin").build();
        assert_eq!(
            check_action(&snapshot, &admin, "delete_document").outcome,
            Outcome::Allow
        );

        let viewer = AttributeContext::builder().subject("role", "viewer").build();
        assert_eq!(
            check_action(&snapshot, &viewer, "delete_document").outcome,
            Outcome::Deny
        );
    }

    #[test]
    fn test_strict_gate_denies_unknown_action() {
        let snapshot = snapshot(EnforcementMode::Strict, vec![]);
        let ctx = AttributeContext::builder().subject("role", "admin").build();
        assert_eq!(
            check_action(&snapshot, &ctx, "export_everything").outcome,
            Outcome::Deny
        );
    }
}
