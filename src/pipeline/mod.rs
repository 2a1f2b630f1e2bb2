//! Query pipeline request and result types.
//!
//! The engine runs a query through the prompt firewall, the retrieval
//! filter, and the output sanitizer in that order. Stage outcomes are
//! aggregated by severity: the pipeline result carries the most severe
//! outcome any stage produced.

pub mod audit;

pub use audit::{AuditFilter, AuditRecord, AuditTrail};

use serde::{Deserialize, Serialize};

use crate::api::{AttributeContext, Decision};
use crate::policy::Outcome;
use crate::stages::{RetrievalOutcome, SanitizedOutput};

/// A query entering the pipeline, with its request metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The raw user query
    pub query: String,
    /// Subject and object attributes for rule evaluation
    #[serde(default)]
    pub context: AttributeContext,
    /// Identity of the requesting subject, for auditing and alerts
    #[serde(default = "unknown")]
    pub subject_identity: String,
    /// Session identifier
    #[serde(default = "unknown")]
    pub session_id: String,
    /// Source IP
    #[serde(default = "unknown")]
    pub ip: String,
}

fn unknown() -> String {
    "unknown".to_string()
}

impl QueryRequest {
    /// Create a request with unknown metadata.
    pub fn new(query: impl Into<String>, context: AttributeContext) -> Self {
        Self {
            query: query.into(),
            context,
            subject_identity: unknown(),
            session_id: unknown(),
            ip: unknown(),
        }
    }

    /// Set the subject identity.
    pub fn subject_identity(mut self, value: impl Into<String>) -> Self {
        self.subject_identity = value.into();
        self
    }

    /// Set the session ID.
    pub fn session_id(mut self, value: impl Into<String>) -> Self {
        self.session_id = value.into();
        self
    }

    /// Set the source IP.
    pub fn ip(mut self, value: impl Into<String>) -> Self {
        self.ip = value.into();
        self
    }

    /// Department from the subject attributes, for alert payloads.
    pub fn department(&self) -> String {
        self.context
            .subject
            .get("department")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string()
    }
}

/// The result of one pipeline run.
#[derive(Debug)]
pub struct PipelineResult {
    /// The most severe outcome across the stages that ran
    pub outcome: Outcome,
    /// The prompt firewall decision
    pub prompt_decision: Decision,
    /// The retrieval filter result; absent when the firewall denied
    pub retrieval: Option<RetrievalOutcome>,
    /// The output sanitizer result; absent when the firewall denied
    pub output: Option<SanitizedOutput>,
    /// The response text to return to the user, if any
    pub response: Option<String>,
}

impl PipelineResult {
    /// A run stopped at the prompt firewall.
    pub fn blocked(prompt_decision: Decision) -> Self {
        Self {
            outcome: prompt_decision.outcome,
            prompt_decision,
            retrieval: None,
            output: None,
            response: None,
        }
    }

    /// Fold the outcomes of all stages that ran into the most severe one.
    pub fn aggregate_outcome(&mut self) {
        let mut outcome = self.prompt_decision.outcome;
        if let Some(retrieval) = &self.retrieval {
            if !retrieval.alerts.is_empty()
                || !retrieval.canary_triggers.is_empty()
                || retrieval.degraded
            {
                outcome = outcome.max(Outcome::Alert);
            }
        }
        if let Some(output) = &self.output {
            outcome = outcome.max(output.outcome);
        }
        self.outcome = outcome;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Stage;

    #[test]
    fn test_aggregation_takes_most_severe() {
        let prompt = Decision::unmatched(Outcome::Allow, Stage::PromptFirewall, "ok");
        let mut result = PipelineResult {
            outcome: Outcome::Allow,
            prompt_decision: prompt,
            retrieval: Some(RetrievalOutcome::default()),
            output: Some(SanitizedOutput {
                text: "x".to_string(),
                outcome: Outcome::Redact,
                masked: vec![],
                leakage_hits: vec![],
            }),
            response: Some("x".to_string()),
        };
        result.aggregate_outcome();
        assert_eq!(result.outcome, Outcome::Redact);
    }

    #[test]
    fn test_degraded_retrieval_raises_outcome() {
        let prompt = Decision::unmatched(Outcome::Allow, Stage::PromptFirewall, "ok");
        let retrieval = RetrievalOutcome {
            degraded: true,
            ..Default::default()
        };
        let mut result = PipelineResult {
            outcome: Outcome::Allow,
            prompt_decision: prompt,
            retrieval: Some(retrieval),
            output: None,
            response: None,
        };
        result.aggregate_outcome();
        assert_eq!(result.outcome, Outcome::Alert);
    }

    #[test]
    fn test_blocked_run() {
        let prompt = Decision::unmatched(Outcome::Deny, Stage::PromptFirewall, "blocked");
        let result = PipelineResult::blocked(prompt);
        assert_eq!(result.outcome, Outcome::Deny);
        assert!(result.response.is_none());
    }
}
