//! The four enforcement stages.

pub mod abac;
pub mod output;
pub mod prompt;
pub mod retrieval;

pub use abac::check_action;
pub use output::{default_leakage_rules, sanitize, LeakageHit, SanitizedOutput};
pub use prompt::{default_rules, screen_query};
pub use retrieval::{
    filter_chunks, ChunkSource, DocumentChunk, ExcludedChunk, RetrievalOutcome,
};
