//! In-memory mind implementation using DashMap.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use kore_bridge_core::{
    traits::{CacheStore, MemoryStore, QueryLog, TraceSink},
    types::{CacheEntry, Identity, Memory, NewMemory, Trace},
    Result,
};

use crate::relevance;
use crate::window_start;

/// Initial salience of a freshly stored memory.
pub const DEFAULT_SALIENCE: f64 = 1.0;

type Key = (String, String);

/// Volatile store holding memories, identity, cache rows, the query log and
/// traces in process memory.
///
/// Cache rows and query-log records are grouped per (hash, scope) key in
/// insertion order, so the newest row for a key is always the last one.
pub struct InMemoryMind {
    memories: RwLock<Vec<Memory>>,
    identity: RwLock<Identity>,
    cache: DashMap<Key, Vec<CacheEntry>>,
    query_log: DashMap<Key, Vec<DateTime<Utc>>>,
    traces: RwLock<Vec<Trace>>,
}

impl InMemoryMind {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            memories: RwLock::new(Vec::new()),
            identity: RwLock::new(Identity::default()),
            cache: DashMap::new(),
            query_log: DashMap::new(),
            traces: RwLock::new(Vec::new()),
        }
    }

    /// Every cache row, including expired ones.
    pub fn cache_rows(&self) -> Vec<CacheEntry> {
        self.cache
            .iter()
            .flat_map(|r| r.value().clone())
            .collect()
    }

    /// Total query-log records across keys.
    pub fn query_log_len(&self) -> usize {
        self.query_log.iter().map(|r| r.value().len()).sum()
    }

    /// Traces in write order.
    pub async fn traces(&self) -> Vec<Trace> {
        self.traces.read().await.clone()
    }

    pub(crate) fn retain_cache(&self, keep: impl Fn(&CacheEntry) -> bool) -> usize {
        let mut removed = 0;
        for mut rows in self.cache.iter_mut() {
            let before = rows.len();
            rows.retain(|e| keep(e));
            removed += before - rows.len();
        }
        self.cache.retain(|_, rows| !rows.is_empty());
        removed
    }

    pub(crate) fn retain_log(&self, keep: impl Fn(&DateTime<Utc>) -> bool) -> usize {
        let mut removed = 0;
        for mut stamps in self.query_log.iter_mut() {
            let before = stamps.len();
            stamps.retain(|at| keep(at));
            removed += before - stamps.len();
        }
        self.query_log.retain(|_, stamps| !stamps.is_empty());
        removed
    }

    fn key(query_hash: &str, scope: &str) -> Key {
        (query_hash.to_string(), scope.to_string())
    }
}

impl Default for InMemoryMind {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMind {
    async fn store(&self, memory: NewMemory) -> Result<Memory> {
        let stored = Memory {
            id: uuid::Uuid::new_v4().to_string(),
            content: memory.content,
            kind: memory.kind,
            source: memory.source,
            tags: memory.tags,
            salience: DEFAULT_SALIENCE,
            created_at: Utc::now(),
        };

        let mut memories = self.memories.write().await;
        memories.push(stored.clone());
        tracing::trace!(id = %stored.id, kind = %stored.kind, total = memories.len(), "Memory stored");
        Ok(stored)
    }

    async fn recall(&self, query: &str, limit: usize, scope: Option<&str>) -> Result<Vec<Memory>> {
        let candidates: Vec<Memory> = self
            .memories
            .read()
            .await
            .iter()
            .filter(|m| scope.map_or(true, |s| m.source == s))
            .cloned()
            .collect();

        Ok(relevance::rank(candidates, query, limit))
    }

    async fn identity(&self) -> Result<Identity> {
        Ok(self.identity.read().await.clone())
    }

    async fn set_identity(&self, identity: Identity) -> Result<()> {
        *self.identity.write().await = identity;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.memories.read().await.len())
    }
}

#[async_trait]
impl CacheStore for InMemoryMind {
    async fn find(&self, query_hash: &str, scope: &str) -> Result<Option<CacheEntry>> {
        Ok(self
            .cache
            .get(&Self::key(query_hash, scope))
            .and_then(|rows| rows.last().cloned()))
    }

    async fn find_any(&self, query_hash: &str) -> Result<Option<CacheEntry>> {
        Ok(self
            .cache
            .iter()
            .filter(|r| r.key().0 == query_hash)
            .filter_map(|r| r.value().last().cloned())
            .max_by_key(|e| e.created_at))
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        let key = Self::key(&entry.query_hash, &entry.scope);
        self.cache.entry(key).or_default().push(entry);
        Ok(())
    }

    async fn record_hit(&self, id: &str) -> Result<()> {
        for mut rows in self.cache.iter_mut() {
            if let Some(entry) = rows.iter_mut().find(|e| e.id == id) {
                entry.hits += 1;
                return Ok(());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl QueryLog for InMemoryMind {
    async fn count_since(&self, query_hash: &str, scope: &str, window: Duration) -> Result<usize> {
        let now = Utc::now();
        let start = window_start(now, window);
        Ok(self
            .query_log
            .get(&Self::key(query_hash, scope))
            .map(|stamps| stamps.iter().filter(|at| **at > start && **at <= now).count())
            .unwrap_or(0))
    }

    async fn log_query(&self, query_hash: &str, scope: &str, at: DateTime<Utc>) -> Result<()> {
        self.query_log
            .entry(Self::key(query_hash, scope))
            .or_default()
            .push(at);
        Ok(())
    }
}

#[async_trait]
impl TraceSink for InMemoryMind {
    async fn save_trace(&self, trace: Trace) -> Result<()> {
        self.traces.write().await.push(trace);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kore_bridge_core::MemoryKind;

    #[tokio::test]
    async fn test_store_and_recall_by_scope() {
        let mind = InMemoryMind::new();
        mind.store(NewMemory::new("alice likes rust").with_source("alice"))
            .await
            .unwrap();
        mind.store(NewMemory::new("bob likes rust").with_source("bob"))
            .await
            .unwrap();

        let recalled = mind.recall("rust", 10, Some("alice")).await.unwrap();
        assert_eq!(recalled.len(), 1);
        assert_eq!(recalled[0].source, "alice");
        assert_eq!(recalled[0].kind, MemoryKind::Semantic);

        assert_eq!(mind.recall("rust", 10, None).await.unwrap().len(), 2);
        assert_eq!(mind.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_newest_cache_row_wins() {
        let mind = InMemoryMind::new();
        mind.put(CacheEntry::new("h", "s", "q", "first", 60.0)).await.unwrap();
        mind.put(CacheEntry::new("h", "s", "q", "second", 60.0)).await.unwrap();

        let found = mind.find("h", "s").await.unwrap().unwrap();
        assert_eq!(found.response, "second");
        assert_eq!(mind.cache_rows().len(), 2);
        assert!(mind.find("h", "other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_any_crosses_scopes() {
        let mind = InMemoryMind::new();
        let old = CacheEntry::new("h", "bob", "q", "bob's", 60.0)
            .created(Utc::now() - chrono::Duration::seconds(10));
        mind.put(old).await.unwrap();
        mind.put(CacheEntry::new("h", "carol", "q", "carol's", 60.0)).await.unwrap();

        let found = mind.find_any("h").await.unwrap().unwrap();
        assert_eq!(found.response, "carol's");
        assert!(mind.find_any("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_hit_increments() {
        let mind = InMemoryMind::new();
        let entry = CacheEntry::new("h", "s", "q", "r", 60.0);
        let id = entry.id.clone();
        mind.put(entry).await.unwrap();

        mind.record_hit(&id).await.unwrap();
        mind.record_hit(&id).await.unwrap();
        mind.record_hit("unknown").await.unwrap();

        assert_eq!(mind.find("h", "s").await.unwrap().unwrap().hits, 2);
    }

    #[tokio::test]
    async fn test_count_since_respects_window() {
        let mind = InMemoryMind::new();
        let now = Utc::now();
        mind.log_query("h", "s", now - chrono::Duration::seconds(120)).await.unwrap();
        mind.log_query("h", "s", now - chrono::Duration::seconds(5)).await.unwrap();
        mind.log_query("h", "s", now).await.unwrap();
        mind.log_query("h", "other", now).await.unwrap();

        let window = Duration::from_secs(60);
        assert_eq!(mind.count_since("h", "s", window).await.unwrap(), 2);
        assert_eq!(mind.count_since("h", "other", window).await.unwrap(), 1);
        assert_eq!(mind.count_since("x", "s", window).await.unwrap(), 0);
        assert_eq!(mind.query_log_len(), 4);
    }

    #[tokio::test]
    async fn test_identity_replace() {
        let mind = InMemoryMind::new();
        assert_eq!(mind.identity().await.unwrap(), Identity::default());

        mind.set_identity(Identity::with_summary("curious")).await.unwrap();
        assert_eq!(mind.identity().await.unwrap().summary, "curious");
    }
}
