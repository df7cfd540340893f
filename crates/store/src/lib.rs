//! Reference stores for kore-bridge.
//!
//! Both stores implement every store trait the gateway needs (`Mind`):
//! memories and identity, the response cache, the rate-limit query log and
//! the trace sink.

pub mod memory;
pub mod relevance;
pub mod retention;
pub mod sqlite;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use kore_bridge_core::{config::StoreConfig, traits::Mind, Result};

pub use memory::InMemoryMind;
pub use retention::{Prunable, PruneReport, RetentionPolicy};
pub use sqlite::SqliteMind;

/// Open the store described by `config`: SQLite when a path is set,
/// otherwise an in-memory mind.
pub fn create_mind(config: &StoreConfig) -> Result<Arc<dyn Mind>> {
    match &config.sqlite_path {
        Some(path) => {
            tracing::info!(path = %path, "Opening SQLite mind");
            Ok(Arc::new(SqliteMind::open(path)?))
        }
        None => {
            tracing::info!("Using in-memory mind");
            Ok(Arc::new(InMemoryMind::new()))
        }
    }
}

/// Start of the trailing `window` ending at `now`.
pub(crate) fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kore_bridge_core::{MemoryStore, NewMemory};

    #[tokio::test]
    async fn test_create_mind_from_config() {
        let mind = create_mind(&StoreConfig::default()).unwrap();
        mind.store(NewMemory::new("hello")).await.unwrap();
        assert_eq!(mind.count().await.unwrap(), 1);

        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let config = StoreConfig {
            sqlite_path: Some(temp_file.path().to_string_lossy().into_owned()),
        };
        let mind = create_mind(&config).unwrap();
        assert_eq!(mind.count().await.unwrap(), 0);
    }
}
