//! SQLite-backed mind for persistent memories, cache and traces.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;
use std::time::Duration;

use kore_bridge_core::{
    traits::{CacheStore, MemoryStore, QueryLog, TraceSink},
    types::{CacheEntry, Identity, Memory, NewMemory, Trace},
    Error, Result,
};

use crate::memory::DEFAULT_SALIENCE;
use crate::relevance;
use crate::window_start;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    kind TEXT NOT NULL,
    source TEXT NOT NULL,
    tags TEXT NOT NULL,         -- JSON array
    salience REAL NOT NULL,
    created_at INTEGER NOT NULL -- unix millis
);
CREATE INDEX IF NOT EXISTS idx_memories_source ON memories (source);

CREATE TABLE IF NOT EXISTS identity (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    body TEXT NOT NULL          -- JSON object
);

CREATE TABLE IF NOT EXISTS cache (
    id TEXT PRIMARY KEY,
    query_hash TEXT NOT NULL,
    scope TEXT NOT NULL,
    query TEXT NOT NULL,
    response TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    ttl_secs REAL NOT NULL,
    hits INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_cache_key ON cache (query_hash, scope);

CREATE TABLE IF NOT EXISTS query_log (
    query_hash TEXT NOT NULL,
    scope TEXT NOT NULL,
    at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_query_log_key ON query_log (query_hash, scope, at);

CREATE TABLE IF NOT EXISTS traces (
    id TEXT PRIMARY KEY,
    operation TEXT NOT NULL,
    input_text TEXT NOT NULL,
    output_text TEXT NOT NULL,
    scope TEXT NOT NULL,
    duration_ms REAL NOT NULL,
    metadata TEXT NOT NULL,     -- JSON
    created_at INTEGER NOT NULL
);
";

const CACHE_COLUMNS: &str =
    "id, query_hash, scope, query, response, created_at, ttl_secs, hits";

/// Persistent store over a single SQLite connection.
///
/// All statements run on the blocking pool; the connection is guarded by an
/// async mutex so writes are serialized.
pub struct SqliteMind {
    conn: Arc<tokio::sync::Mutex<Connection>>,
}

impl SqliteMind {
    /// Open (or create) the database at `path` and initialize the schema.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err("open"))?;
        Self::init(conn)
    }

    /// Private database that disappears with the connection.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("open"))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(db_err("schema"))?;
        Ok(Self {
            conn: Arc::new(tokio::sync::Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    pub(crate) async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .map_err(|e| Error::internal(e.to_string()))?
    }

    /// Most recent traces, newest first.
    pub async fn recent_traces(&self, limit: usize) -> Result<Vec<Trace>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, operation, input_text, output_text, scope, duration_ms, metadata, created_at
                     FROM traces ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                )
                .map_err(db_err("prepare"))?;
            let rows = stmt
                .query_map(params![limit as i64], |row| {
                    let metadata: String = row.get(6)?;
                    Ok(Trace {
                        id: row.get(0)?,
                        operation: row.get(1)?,
                        input_text: row.get(2)?,
                        output_text: row.get(3)?,
                        scope: row.get(4)?,
                        duration_ms: row.get(5)?,
                        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
                        created_at: from_millis(row.get(7)?),
                    })
                })
                .map_err(db_err("query"))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(db_err("row"))?;
            Ok(rows)
        })
        .await
    }
}

fn db_err(op: &'static str) -> impl Fn(rusqlite::Error) -> Error {
    move |e| Error::storage(format!("sqlite {} failed: {}", op, e))
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn cache_row(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
    let hits: i64 = row.get(7)?;
    Ok(CacheEntry {
        id: row.get(0)?,
        query_hash: row.get(1)?,
        scope: row.get(2)?,
        query: row.get(3)?,
        response: row.get(4)?,
        created_at: from_millis(row.get(5)?),
        ttl_secs: row.get(6)?,
        hits: hits.max(0) as u64,
    })
}

#[async_trait]
impl MemoryStore for SqliteMind {
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
        let tags_json = serde_json::to_string(&stored.tags)?;

        let row = stored.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO memories (id, content, kind, source, tags, salience, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.id,
                    row.content,
                    row.kind.as_str(),
                    row.source,
                    tags_json,
                    row.salience,
                    to_millis(row.created_at)
                ],
            )
            .map_err(db_err("insert memory"))?;
            Ok(())
        })
        .await?;

        tracing::trace!(id = %stored.id, kind = %stored.kind, "Memory persisted");
        Ok(stored)
    }

    async fn recall(&self, query: &str, limit: usize, scope: Option<&str>) -> Result<Vec<Memory>> {
        let scope = scope.map(str::to_string);
        let candidates = self
            .with_conn(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, content, kind, source, tags, salience, created_at
                         FROM memories WHERE (?1 IS NULL OR source = ?1)",
                    )
                    .map_err(db_err("prepare"))?;
                let raw = stmt
                    .query_map(params![scope], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, f64>(5)?,
                            row.get::<_, i64>(6)?,
                        ))
                    })
                    .map_err(db_err("query"))?
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(db_err("row"))?;

                raw.into_iter()
                    .map(|(id, content, kind, source, tags, salience, created_at)| {
                        Ok(Memory {
                            id,
                            content,
                            kind: kind.parse()?,
                            source,
                            tags: serde_json::from_str(&tags).unwrap_or_default(),
                            salience,
                            created_at: from_millis(created_at),
                        })
                    })
                    .collect::<Result<Vec<Memory>>>()
            })
            .await?;

        // Ranking happens in process, same as the in-memory store.
        Ok(relevance::rank(candidates, query, limit))
    }

    async fn identity(&self) -> Result<Identity> {
        let body: Option<String> = self
            .with_conn(|conn| {
                conn.query_row("SELECT body FROM identity WHERE id = 1", [], |row| row.get(0))
                    .optional()
                    .map_err(db_err("read identity"))
            })
            .await?;

        match body {
            Some(body) => Ok(serde_json::from_str(&body)?),
            None => Ok(Identity::default()),
        }
    }

    async fn set_identity(&self, identity: Identity) -> Result<()> {
        let body = serde_json::to_string(&identity)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO identity (id, body) VALUES (1, ?1)",
                params![body],
            )
            .map_err(db_err("write identity"))?;
            Ok(())
        })
        .await
    }

    async fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))
                .map_err(db_err("count"))?;
            Ok(count as usize)
        })
        .await
    }
}

#[async_trait]
impl CacheStore for SqliteMind {
    async fn find(&self, query_hash: &str, scope: &str) -> Result<Option<CacheEntry>> {
        let (hash, scope) = (query_hash.to_string(), scope.to_string());
        self.with_conn(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM cache WHERE query_hash = ?1 AND scope = ?2
                     ORDER BY created_at DESC, rowid DESC LIMIT 1",
                    CACHE_COLUMNS
                ),
                params![hash, scope],
                cache_row,
            )
            .optional()
            .map_err(db_err("find cache"))
        })
        .await
    }

    async fn find_any(&self, query_hash: &str) -> Result<Option<CacheEntry>> {
        let hash = query_hash.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM cache WHERE query_hash = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1",
                    CACHE_COLUMNS
                ),
                params![hash],
                cache_row,
            )
            .optional()
            .map_err(db_err("find cache"))
        })
        .await
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO cache ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    CACHE_COLUMNS
                ),
                params![
                    entry.id,
                    entry.query_hash,
                    entry.scope,
                    entry.query,
                    entry.response,
                    to_millis(entry.created_at),
                    entry.ttl_secs,
                    entry.hits as i64
                ],
            )
            .map_err(db_err("insert cache"))?;
            Ok(())
        })
        .await
    }

    async fn record_hit(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.execute("UPDATE cache SET hits = hits + 1 WHERE id = ?1", params![id])
                .map_err(db_err("record hit"))?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl QueryLog for SqliteMind {
    async fn count_since(&self, query_hash: &str, scope: &str, window: Duration) -> Result<usize> {
        let now = Utc::now();
        let start = to_millis(window_start(now, window));
        let end = to_millis(now);
        let (hash, scope) = (query_hash.to_string(), scope.to_string());

        self.with_conn(move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM query_log
                     WHERE query_hash = ?1 AND scope = ?2 AND at > ?3 AND at <= ?4",
                    params![hash, scope, start, end],
                    |row| row.get(0),
                )
                .map_err(db_err("count queries"))?;
            Ok(count as usize)
        })
        .await
    }

    async fn log_query(&self, query_hash: &str, scope: &str, at: DateTime<Utc>) -> Result<()> {
        let (hash, scope) = (query_hash.to_string(), scope.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO query_log (query_hash, scope, at) VALUES (?1, ?2, ?3)",
                params![hash, scope, to_millis(at)],
            )
            .map_err(db_err("log query"))?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl TraceSink for SqliteMind {
    async fn save_trace(&self, trace: Trace) -> Result<()> {
        let metadata = serde_json::to_string(&trace.metadata)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO traces (id, operation, input_text, output_text, scope, duration_ms, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    trace.id,
                    trace.operation,
                    trace.input_text,
                    trace.output_text,
                    trace.scope,
                    trace.duration_ms,
                    metadata,
                    to_millis(trace.created_at)
                ],
            )
            .map_err(db_err("insert trace"))?;
            Ok(())
        })
        .await
    }
}
