//! Retrieval filter stage.
//!
//! Runs after vector search and before context assembly. Each candidate
//! chunk passes through three checks in order: the canary registry, the
//! clearance ceiling, and the retrieval rule set evaluated against a
//! per-chunk context. A chunk fails closed when its sensitivity or the
//! subject's clearance is missing or non-numeric.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::{AttributeContext, Decision};
use crate::canary::{CanaryRegistry, CanaryTrigger};
use crate::core::{evaluate, RuleSetSnapshot};
use crate::policy::AttributeValue;

/// A candidate chunk produced by vector search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Chunk identifier
    pub id: String,
    /// Chunk text
    pub content: String,
    /// Document metadata used as the object attributes for rule evaluation
    #[serde(default)]
    pub metadata: HashMap<String, AttributeValue>,
}

impl DocumentChunk {
    /// Create a chunk.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata attribute.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Candidate chunks, or a marker that the document store could not be
/// reached.
#[derive(Debug, Clone)]
pub enum ChunkSource {
    /// Chunks fetched from the store
    Available(Vec<DocumentChunk>),
    /// The store was unreachable; retrieval degrades to an empty context
    Unavailable,
}

/// A chunk excluded from the context, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedChunk {
    /// The excluded chunk's ID
    pub chunk_id: String,
    /// Why it was excluded
    pub reason: String,
}

/// The result of filtering one retrieval batch.
#[derive(Debug, Default)]
pub struct RetrievalOutcome {
    /// Chunks admitted into the context
    pub admitted: Vec<DocumentChunk>,
    /// Chunks excluded, with reasons
    pub excluded: Vec<ExcludedChunk>,
    /// Canaries that fired during this batch
    pub canary_triggers: Vec<CanaryTrigger>,
    /// Alert-outcome decisions raised by retrieval rules
    pub alerts: Vec<Decision>,
    /// True when the store was unreachable and the context is empty
    pub degraded: bool,
}

impl RetrievalOutcome {
    fn degraded() -> Self {
        Self {
            degraded: true,
            ..Self::default()
        }
    }
}

/// Filter a retrieval batch for the given subject context.
pub fn filter_chunks(
    snapshot: &RuleSetSnapshot,
    registry: &CanaryRegistry,
    ctx: &AttributeContext,
    source: ChunkSource,
    clearance_attribute: &str,
    sensitivity_attribute: &str,
) -> RetrievalOutcome {
    let chunks = match source {
        ChunkSource::Available(chunks) => chunks,
        ChunkSource::Unavailable => {
            warn!("document store unavailable, returning empty context");
            return RetrievalOutcome::degraded();
        }
    };

    let mut outcome = RetrievalOutcome::default();
    let clearance = ctx
        .subject
        .get(clearance_attribute)
        .and_then(AttributeValue::as_number);

    for chunk in chunks {
        // Canary first: a decoy must never reach the context, whether the
        // hit fires the canary or finds it already triggered.
        if let Some(hit) = registry.check_content(&chunk.content) {
            outcome.excluded.push(ExcludedChunk {
                chunk_id: chunk.id.clone(),
                reason: format!("Canary '{}' hit", hit.canary.id),
            });
            if let Some(trigger) = hit.trigger {
                outcome.canary_triggers.push(trigger);
            }
            continue;
        }

        // Clearance ceiling, numeric and fail-closed.
        let sensitivity = chunk
            .metadata
            .get(sensitivity_attribute)
            .and_then(AttributeValue::as_number);
        match (clearance, sensitivity) {
            (Some(clearance), Some(sensitivity)) if clearance >= sensitivity => {}
            (Some(_), Some(_)) => {
                outcome.excluded.push(ExcludedChunk {
                    chunk_id: chunk.id.clone(),
                    reason: "Sensitivity exceeds subject clearance".to_string(),
                });
                continue;
            }
            _ => {
                outcome.excluded.push(ExcludedChunk {
                    chunk_id: chunk.id.clone(),
                    reason: "Missing or non-numeric clearance or sensitivity".to_string(),
                });
                continue;
            }
        }

        // Retrieval rules against the per-chunk context.
        let chunk_ctx = ctx.with_object(chunk.metadata.clone());
        let decision = evaluate(snapshot, None, &chunk_ctx);
        if decision.is_allowed() {
            if decision.outcome == crate::policy::Outcome::Alert {
                outcome.alerts.push(decision);
            }
            outcome.admitted.push(chunk);
        } else {
            outcome.excluded.push(ExcludedChunk {
                chunk_id: chunk.id.clone(),
                reason: decision.reason,
            });
        }
    }

    outcome
}
