//! Request gateway for kore-bridge.
//!
//! This crate provides the `think` pipeline between callers and language
//! model backends (cache, rate limiting, memory-aware context), identity
//! reflection, A/B experiments, and the process telemetry setup.

pub mod context;
pub mod experiment;
pub mod gateway;
pub mod lanes;
pub mod metrics;
pub mod reflect;
pub mod tracing_layer;

pub use context::build_context;
pub use experiment::{Experiment, ExperimentResult, Variant};
pub use gateway::{Gateway, ThinkOptions, ThinkOutcome, ThinkResult, THINK_OPERATION};
pub use crate::metrics::setup_metrics_recorder;
pub use reflect::{identity_or_fallback, parse_identity};
pub use tracing_layer::configure_tracing;
