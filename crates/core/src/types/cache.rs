use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Cache & Rate-Limit Records
// =============================================================================

/// A memoized response for one (hash, scope) key.
///
/// Rows are never rewritten except for `hits`; expiry is decided on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Unique row ID.
    pub id: String,
    /// Normalized query hash.
    pub query_hash: String,
    /// Requester scope.
    pub scope: String,
    /// Query text as first asked.
    pub query: String,
    /// Cached response.
    pub response: String,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
    /// Seconds the row stays eligible as a hit.
    pub ttl_secs: f64,
    /// Hit count for analytics.
    pub hits: u64,
}

impl CacheEntry {
    /// Create a fresh entry stamped with the current time.
    pub fn new(
        query_hash: impl Into<String>,
        scope: impl Into<String>,
        query: impl Into<String>,
        response: impl Into<String>,
        ttl_secs: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            query_hash: query_hash.into(),
            scope: scope.into(),
            query: query.into(),
            response: response.into(),
            created_at: Utc::now(),
            ttl_secs,
            hits: 0,
        }
    }

    /// Override the creation time.
    pub fn created(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// `now - created_at < ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let age_ms = now.signed_duration_since(self.created_at).num_milliseconds();
        (age_ms as f64) < self.ttl_secs * 1000.0
    }
}

/// One occurrence of a query, counted by the rate limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLogRecord {
    pub query_hash: String,
    pub scope: String,
    pub at: DateTime<Utc>,
}

impl QueryLogRecord {
    pub fn new(query_hash: impl Into<String>, scope: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            query_hash: query_hash.into(),
            scope: scope.into(),
            at,
        }
    }
}
