//! Core types, traits, and error definitions for kore-bridge.
//!
//! This crate provides the building blocks shared by the store, the model
//! gateway and the request pipeline.

pub mod config;
pub mod error;
pub mod mocks;
pub mod query;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use query::{normalize, query_hash, Query};
pub use traits::*;
pub use types::*;
