//! Snapshot compilation and rule evaluation.

pub mod evaluator;
pub mod snapshot;

pub use evaluator::evaluate;
pub use snapshot::{
    CompiledCondition, CompiledLeakageRule, CompiledMaskingRule, CompiledRule, OutputRuleSnapshot,
    RuleSetSnapshot,
};
