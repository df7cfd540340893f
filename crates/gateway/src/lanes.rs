//! Single-flight lanes for identical in-flight requests.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key lanes serializing identical requests.
///
/// Two `think` calls for the same (hash, scope) run one after the other, so
/// the second sees the cache entry written by the first.
#[derive(Default)]
pub struct RequestLanes {
    lanes: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl RequestLanes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lane of `(query_hash, scope)`; held until the guard drops.
    pub async fn acquire(&self, query_hash: &str, scope: &str) -> LaneGuard<'_> {
        let key = (query_hash.to_string(), scope.to_string());
        let lane = self
            .lanes
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lane.lock_owned().await;
        LaneGuard {
            lanes: self,
            key,
            guard: Some(guard),
        }
    }

    /// Lanes currently allocated.
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

pub struct LaneGuard<'a> {
    lanes: &'a RequestLanes,
    key: (String, String),
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for LaneGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Forget the lane once nobody else holds or waits on it.
        self.lanes
            .lanes
            .remove_if(&self.key, |_, lane| Arc::strong_count(lane) == 1);
    }
}
