//! Collaborator traits for kore-bridge.
//!
//! Traits are organized by the collaborator they describe:
//! - `llm`: backend capabilities (Provider, ComplexityClassifier)
//! - `store`: the memory/identity store and its cache, query-log and trace primitives

pub mod llm;
pub mod store;

pub use llm::*;
pub use store::*;
