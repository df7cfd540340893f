//! kore-bridge: a memory-aware request gateway in front of language models.
//!
//! Re-exports the workspace crates so applications depend on one name:
//!
//! - [`core`]: errors, configuration, domain types and collaborator traits
//! - [`store`]: in-memory and SQLite stores
//! - [`model_gateway`]: providers, routers and the provider factory
//! - [`gateway`]: the `think` pipeline, reflection and experiments

pub use kore_bridge_core as core;
pub use kore_bridge_gateway as gateway;
pub use kore_bridge_model_gateway as model_gateway;
pub use kore_bridge_store as store;

pub use kore_bridge_core::{AppConfig, Error, Result};
pub use kore_bridge_gateway::{Experiment, ExperimentResult, Gateway, ThinkOptions, ThinkOutcome};
