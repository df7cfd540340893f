//! Memory store traits.
//!
//! The gateway only sees these contracts; ranking, retrieval and schema
//! belong to the implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::Result;
use crate::types::{CacheEntry, Identity, Memory, NewMemory, Trace};

/// Long-term memory and identity.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Persist a new memory and return it as stored.
    async fn store(&self, memory: NewMemory) -> Result<Memory>;

    /// Memories relevant to `query`, most relevant first.
    ///
    /// An empty query returns the most recent memories. `scope` restricts
    /// results to memories whose source matches.
    async fn recall(&self, query: &str, limit: usize, scope: Option<&str>) -> Result<Vec<Memory>>;

    /// Current identity profile.
    async fn identity(&self) -> Result<Identity>;

    /// Replace the identity profile.
    async fn set_identity(&self, identity: Identity) -> Result<()>;

    /// Number of stored memories.
    async fn count(&self) -> Result<usize>;
}

/// Response cache keyed by (query hash, scope).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Newest entry for the key, fresh or not.
    async fn find(&self, query_hash: &str, scope: &str) -> Result<Option<CacheEntry>>;

    /// Newest entry for the hash in any scope.
    async fn find_any(&self, query_hash: &str) -> Result<Option<CacheEntry>>;

    /// Insert a row. Earlier rows for the same key are left untouched.
    async fn put(&self, entry: CacheEntry) -> Result<()>;

    /// Increment the hit counter of a row.
    async fn record_hit(&self, id: &str) -> Result<()>;
}

/// Append-only query log used for rate limiting.
#[async_trait]
pub trait QueryLog: Send + Sync {
    /// Records for the key within the trailing `window` from now.
    async fn count_since(&self, query_hash: &str, scope: &str, window: Duration) -> Result<usize>;

    /// Append one record.
    async fn log_query(&self, query_hash: &str, scope: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Sink for structured trace records.
#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn save_trace(&self, trace: Trace) -> Result<()>;
}

/// Everything the gateway needs from its store.
pub trait Mind: MemoryStore + CacheStore + QueryLog + TraceSink {}

impl<T> Mind for T where T: MemoryStore + CacheStore + QueryLog + TraceSink {}
