//! Query normalization and hashing.
//!
//! The hash is the cache and rate-limit key for a query, so two prompts that
//! differ only in case or whitespace share every piece of gateway state.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 digest.
pub const QUERY_HASH_LEN: usize = 16;

/// A query in all three forms the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Text exactly as the caller sent it.
    pub raw: String,
    /// Lowercased, whitespace-collapsed, trimmed text.
    pub normalized: String,
    /// Fixed-length digest of `normalized`.
    pub hash: String,
}

impl Query {
    /// Normalize and hash `raw`.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = normalize(&raw);
        let hash = hash_normalized(&normalized);
        Self {
            raw,
            normalized,
            hash,
        }
    }
}

/// Lowercase, collapse whitespace runs to a single space and trim.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hash of the normalized form of `text`.
pub fn query_hash(text: &str) -> String {
    hash_normalized(&normalize(text))
}

fn hash_normalized(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..QUERY_HASH_LEN].to_string()
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
