//! Mock implementations of core traits for testing.
//!
//! This module provides mock implementations of the collaborator traits that
//! can be used across the workspace for unit and integration testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::{
    query::normalize,
    traits::{CacheStore, ComplexityClassifier, MemoryStore, Provider, QueryLog, TraceSink},
    types::{
        CacheEntry, ChatMessage, Classification, Completion, Identity, Memory, NewMemory,
        QueryLogRecord, Trace,
    },
    Error, Result,
};

// =============================================================================
// Mock Provider
// =============================================================================

/// Provider that echoes the last user message behind a prefix, or replays a
/// script, and counts its calls.
pub struct MockProvider {
    prefix: String,
    script: Mutex<Vec<String>>,
    should_fail: bool,
    delay: Option<Duration>,
    complete_calls: AtomicUsize,
    summarize_calls: AtomicUsize,
    last_messages: Mutex<Vec<ChatMessage>>,
}

impl MockProvider {
    /// Echo provider: answers `"{prefix}: {last user message}"`.
    pub fn echo(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            script: Mutex::new(Vec::new()),
            should_fail: false,
            delay: None,
            complete_calls: AtomicUsize::new(0),
            summarize_calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    /// Provider that returns `responses` in order, then echoes.
    pub fn scripted(responses: Vec<String>) -> Self {
        let provider = Self::echo("Echo");
        *provider.script.lock().unwrap() = responses;
        provider
    }

    /// Provider that always returns the same text.
    pub fn constant(response: &str) -> Self {
        Self::scripted(vec![response.to_string(); 64])
    }

    /// Provider whose every call fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::echo("")
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `complete` calls so far.
    pub fn call_count(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    /// Number of `summarize` calls so far.
    pub fn summarize_count(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    /// Messages of the most recent `complete` call.
    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages.lock().unwrap().clone()
    }

    fn answer(&self, messages: &[ChatMessage]) -> Result<Completion> {
        if self.should_fail {
            return Err(Error::provider("Mock failure"));
        }
        let mut script = self.script.lock().unwrap();
        if !script.is_empty() {
            return Ok(Completion::text(script.remove(0)));
        }
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("empty");
        Ok(Completion::text(format!("{}: {}", self.prefix, last_user)))
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = messages.to_vec();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answer(messages)
    }

    async fn summarize(&self, text: &str, instruction: &str) -> Result<Completion> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        self.answer(&[ChatMessage::system(instruction), ChatMessage::user(text)])
    }
}

// =============================================================================
// Mock Classifier
// =============================================================================

/// Classifier that reports the same level for every query.
pub struct FixedClassifier {
    level: u8,
    calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(level: u8) -> Self {
        Self {
            level,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComplexityClassifier for FixedClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Classification {
            level: self.level,
            metadata: serde_json::json!({ "classifier": "fixed", "chars": text.chars().count() }),
        })
    }
}

// =============================================================================
// Mock Mind
// =============================================================================

/// Mutex-backed store implementing every store trait, with a switch to make
/// trace writes fail.
#[derive(Default)]
pub struct MockMind {
    memories: Mutex<Vec<Memory>>,
    identity: Mutex<Identity>,
    cache: Mutex<Vec<CacheEntry>>,
    log: Mutex<Vec<QueryLogRecord>>,
    traces: Mutex<Vec<Trace>>,
    fail_traces: bool,
}

impl MockMind {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `save_trace` returns a storage error.
    pub fn with_failing_traces() -> Self {
        Self {
            fail_traces: true,
            ..Self::default()
        }
    }

    pub fn traces(&self) -> Vec<Trace> {
        self.traces.lock().unwrap().clone()
    }

    pub fn cache_entries(&self) -> Vec<CacheEntry> {
        self.cache.lock().unwrap().clone()
    }

    pub fn log_records(&self) -> Vec<QueryLogRecord> {
        self.log.lock().unwrap().clone()
    }

    pub fn memories(&self) -> Vec<Memory> {
        self.memories.lock().unwrap().clone()
    }
}

#[async_trait]
impl MemoryStore for MockMind {
    async fn store(&self, memory: NewMemory) -> Result<Memory> {
        let stored = Memory {
            id: uuid::Uuid::new_v4().to_string(),
            content: memory.content,
            kind: memory.kind,
            source: memory.source,
            tags: memory.tags,
            salience: 1.0,
            created_at: Utc::now(),
        };
        self.memories.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn recall(&self, query: &str, limit: usize, scope: Option<&str>) -> Result<Vec<Memory>> {
        let needle = normalize(query);
        let memories = self.memories.lock().unwrap();
        Ok(memories
            .iter()
            .rev()
            .filter(|m| scope.map_or(true, |s| m.source == s))
            .filter(|m| {
                needle.is_empty()
                    || needle
                        .split(' ')
                        .any(|word| normalize(&m.content).contains(word))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn identity(&self) -> Result<Identity> {
        Ok(self.identity.lock().unwrap().clone())
    }

    async fn set_identity(&self, identity: Identity) -> Result<()> {
        *self.identity.lock().unwrap() = identity;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.memories.lock().unwrap().len())
    }
}

#[async_trait]
impl CacheStore for MockMind {
    async fn find(&self, query_hash: &str, scope: &str) -> Result<Option<CacheEntry>> {
        let cache = self.cache.lock().unwrap();
        Ok(cache
            .iter()
            .rev()
            .find(|e| e.query_hash == query_hash && e.scope == scope)
            .cloned())
    }

    async fn find_any(&self, query_hash: &str) -> Result<Option<CacheEntry>> {
        let cache = self.cache.lock().unwrap();
        Ok(cache.iter().rev().find(|e| e.query_hash == query_hash).cloned())
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        self.cache.lock().unwrap().push(entry);
        Ok(())
    }

    async fn record_hit(&self, id: &str) -> Result<()> {
        if let Some(entry) = self.cache.lock().unwrap().iter_mut().find(|e| e.id == id) {
            entry.hits += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl QueryLog for MockMind {
    async fn count_since(&self, query_hash: &str, scope: &str, window: Duration) -> Result<usize> {
        let cutoff = cutoff(window);
        let log = self.log.lock().unwrap();
        Ok(log
            .iter()
            .filter(|r| r.query_hash == query_hash && r.scope == scope && r.at > cutoff)
            .count())
    }

    async fn log_query(&self, query_hash: &str, scope: &str, at: DateTime<Utc>) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(QueryLogRecord::new(query_hash, scope, at));
        Ok(())
    }
}

#[async_trait]
impl TraceSink for MockMind {
    async fn save_trace(&self, trace: Trace) -> Result<()> {
        if self.fail_traces {
            return Err(Error::storage("trace sink unavailable"));
        }
        self.traces.lock().unwrap().push(trace);
        Ok(())
    }
}

/// Start of the trailing window ending now.
fn cutoff(window: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
