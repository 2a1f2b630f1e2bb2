//! Policy decision engine and canary forensics for RAG applications.
//!
//! Enforcement runs in four stages: a prompt firewall over the raw query, a
//! retrieval filter over candidate document chunks, an output sanitizer over
//! the generated response, and a standalone ABAC gate for non-query
//! operations. Rules are typed, ordered, and evaluated first-match-wins
//! against immutable compiled snapshots that are swapped atomically when
//! rules change. Canary documents carry a watermark token and fire exactly
//! once when retrieved; alerts fan out asynchronously and never block the
//! decision path.
//!
//! # Example
//!
//! ```no_run
//! use rag_policy_engine::{
//!     AttributeContext, ChunkSource, DocumentChunk, PolicyEngine, QueryRequest,
//! };
//!
//! # fn main() -> rag_policy_engine::Result<()> {
//! let engine = PolicyEngine::builder()
//!     .with_default_firewall_rules()
//!     .build()?;
//!
//! let ctx = AttributeContext::builder()
//!     .subject("department", "engineering")
//!     .subject("clearance", 3.0)
//!     .build();
//! let request = QueryRequest::new("what is the leave policy?", ctx)
//!     .subject_identity("alice");
//!
//! let chunks = vec![
//!     DocumentChunk::new("c-1", "handbook text").with_metadata("sensitivity", 1.0),
//! ];
//! let result = engine.run_query(&request, ChunkSource::Available(chunks), |admitted| {
//!     // hand the admitted chunks to the model
//!     format!("answer built from {} chunks", admitted.len())
//! });
//! println!("{:?}", result.outcome);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod alert;
pub mod api;
pub mod cache;
pub mod canary;
pub mod config;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod stages;
pub mod telemetry;

pub use alert::{AlertChannel, AlertDispatcher, AlertPayload, RetryPolicy};
pub use api::{AttributeContext, Decision, PolicyEngine, PolicyEngineBuilder};
pub use canary::{Canary, CanaryHit, CanaryRegistry, CanaryStatus, CanaryTrigger, WatermarkService};
pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{AuditFilter, AuditRecord, PipelineResult, QueryRequest};
pub use policy::{
    Condition, ConditionOperator, ConditionValue, EnforcementMode, LeakageAction, LeakageRule,
    MaskingRule, Outcome, Rule, RuleAction, RuleSet, RuleSetDocument, Severity, Stage,
};
pub use stages::{ChunkSource, DocumentChunk, RetrievalOutcome, SanitizedOutput};
pub use telemetry::{Telemetry, TelemetrySnapshot};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
