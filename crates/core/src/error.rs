//! Error types for kore-bridge.

use thiserror::Error;

/// Result type alias using kore-bridge's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for kore-bridge.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid wiring detected at construction time (e.g. a router with no providers).
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Config source error: {0}")]
    Config(#[from] config::ConfigError),

    // =========================================================================
    // Provider Errors
    // =========================================================================
    /// A backend call failed. The gateway never catches this.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The complexity router has no classifier to consult.
    #[error("Complexity classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    /// The identity summary did not match the expected JSON schema.
    #[error("Malformed summary response: {0}")]
    MalformedSummary(String),

    // =========================================================================
    // Store Errors
    // =========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a provider error.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
