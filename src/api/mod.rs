//! Public API surface: engine facade, contexts, decisions.

pub mod context;
pub mod decision;
pub mod engine;

pub use context::{AttributeContext, AttributeContextBuilder};
pub use decision::Decision;
pub use engine::{PolicyEngine, PolicyEngineBuilder};
