//! Data retention policy and pruning logic.
//!
//! The request pipeline never deletes rows: expired cache entries are a miss
//! on read but stay on disk, and the query log only grows. Operators call
//! these methods to reclaim space.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use kore_bridge_core::Result;

use crate::{InMemoryMind, SqliteMind};

/// Configuration for data retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Drop query-log records older than this (e.g. 7 days).
    pub query_log_max_age: Option<Duration>,
    /// Delete cache rows whose TTL has elapsed.
    pub sweep_expired_cache: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            query_log_max_age: Some(Duration::from_secs(7 * 24 * 60 * 60)), // 7 days
            sweep_expired_cache: true,
        }
    }
}

/// Rows removed by one `apply` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub query_log: usize,
    pub cache: usize,
}

/// Trait for stores that support pruning old data.
#[async_trait]
pub trait Prunable: Send + Sync {
    /// Delete query-log records stamped before `before`.
    /// Returns the number of records deleted.
    async fn prune_query_log(&self, before: DateTime<Utc>) -> Result<usize>;

    /// Delete cache rows that are no longer fresh at `now`.
    async fn sweep_expired_cache(&self, now: DateTime<Utc>) -> Result<usize>;

    /// Run every step the policy enables.
    async fn apply(&self, policy: &RetentionPolicy, now: DateTime<Utc>) -> Result<PruneReport> {
        let mut report = PruneReport::default();
        if let Some(max_age) = policy.query_log_max_age {
            report.query_log = self.prune_query_log(crate::window_start(now, max_age)).await?;
        }
        if policy.sweep_expired_cache {
            report.cache = self.sweep_expired_cache(now).await?;
        }
        tracing::info!(
            query_log = report.query_log,
            cache = report.cache,
            "Retention pass complete"
        );
        Ok(report)
    }
}

#[async_trait]
impl Prunable for InMemoryMind {
    async fn prune_query_log(&self, before: DateTime<Utc>) -> Result<usize> {
        Ok(self.retain_log(|at| *at >= before))
    }

    async fn sweep_expired_cache(&self, now: DateTime<Utc>) -> Result<usize> {
        Ok(self.retain_cache(|entry| entry.is_fresh(now)))
    }
}

#[async_trait]
impl Prunable for SqliteMind {
    async fn prune_query_log(&self, before: DateTime<Utc>) -> Result<usize> {
        let before = before.timestamp_millis();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM query_log WHERE at < ?1", params![before])
                .map_err(|e| kore_bridge_core::Error::storage(format!("prune query log: {}", e)))
        })
        .await
    }

    async fn sweep_expired_cache(&self, now: DateTime<Utc>) -> Result<usize> {
        let now = now.timestamp_millis();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM cache WHERE (?1 - created_at) >= ttl_secs * 1000.0",
                params![now],
            )
            .map_err(|e| kore_bridge_core::Error::storage(format!("sweep cache: {}", e)))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use kore_bridge_core::{CacheEntry, CacheStore, QueryLog};

    async fn seed(store: &(impl CacheStore + QueryLog)) -> DateTime<Utc> {
        let now = Utc::now();
        let stale = CacheEntry::new("h", "s", "q", "stale", 10.0)
            .created(now - ChronoDuration::seconds(60));
        store.put(stale).await.unwrap();
        store.put(CacheEntry::new("h2", "s", "q", "fresh", 3600.0)).await.unwrap();

        store.log_query("h", "s", now - ChronoDuration::days(30)).await.unwrap();
        store.log_query("h", "s", now).await.unwrap();
        now
    }

    #[tokio::test]
    async fn test_in_memory_apply_default_policy() {
        let mind = InMemoryMind::new();
        let now = seed(&mind).await;

        let report = mind.apply(&RetentionPolicy::default(), now).await.unwrap();
        assert_eq!(report, PruneReport { query_log: 1, cache: 1 });
        assert_eq!(mind.query_log_len(), 1);
        assert!(mind.find("h", "s").await.unwrap().is_none());
        assert!(mind.find("h2", "s").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sqlite_apply_default_policy() {
        let mind = SqliteMind::open_in_memory().unwrap();
        let now = seed(&mind).await;

        let report = mind.apply(&RetentionPolicy::default(), now).await.unwrap();
        assert_eq!(report, PruneReport { query_log: 1, cache: 1 });
        assert!(mind.find("h", "s").await.unwrap().is_none());
        assert_eq!(
            mind.count_since("h", "s", Duration::from_secs(3600)).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_disabled_policy_removes_nothing() {
        let mind = InMemoryMind::new();
        let now = seed(&mind).await;

        let policy = RetentionPolicy {
            query_log_max_age: None,
            sweep_expired_cache: false,
        };
        assert_eq!(mind.apply(&policy, now).await.unwrap(), PruneReport::default());
        assert_eq!(mind.cache_rows().len(), 2);
    }
}
