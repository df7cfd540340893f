//! Core type definitions for kore-bridge.
//!
//! Broken down into submodules by the collaborator that owns each record.

pub mod cache;
pub mod memory;
pub mod message;
pub mod trace;

pub use cache::*;
pub use memory::*;
pub use message::*;
pub use trace::*;
