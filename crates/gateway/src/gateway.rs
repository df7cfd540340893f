//! The `think` pipeline.
//!
//! Every request runs the same ordered steps: normalize and hash, scoped
//! cache lookup, rate-limit check with fallback, query logging, recall,
//! context assembly, backend dispatch, memoization, conversation capture
//! and a best-effort trace.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kore_bridge_core::{
    config::{AppConfig, GatewayConfig},
    query::{truncate_chars, Query},
    traits::{Mind, Provider},
    types::{
        CacheEntry, ChatMessage, Identity, Memory, MemoryKind, NewMemory, RouteDecision, Trace,
    },
    Result,
};

use crate::context::build_context;
use crate::lanes::RequestLanes;
use crate::metrics::{track_think, track_trace_failure};
use crate::reflect::{
    format_memories, identity_or_fallback, EMPTY_SUMMARY, REFLECT_INSTRUCTION,
    REFLECT_MEMORY_LIMIT,
};

/// Operation name written to traces.
pub const THINK_OPERATION: &str = "gateway.think";

/// Per-request switches.
#[derive(Debug, Clone)]
pub struct ThinkOptions {
    /// Requester identity; selects the scope.
    pub user: Option<String>,
    /// Extra system text placed ahead of the generated context.
    pub system: Option<String>,
    /// Store the exchange as two episodic memories.
    pub remember: bool,
    /// Read and write the response cache.
    pub use_cache: bool,
    /// Count the query against the rate limit and allow its fallbacks.
    pub rate_limit: bool,
}

impl Default for ThinkOptions {
    fn default() -> Self {
        Self {
            user: None,
            system: None,
            remember: true,
            use_cache: true,
            rate_limit: true,
        }
    }
}

impl ThinkOptions {
    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn remember(mut self, remember: bool) -> Self {
        self.remember = remember;
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn rate_limit(mut self, rate_limit: bool) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

/// How a `think` call produced its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkOutcome {
    /// Fresh entry in the requester's own cache scope.
    CacheHit,
    /// Over the rate limit; answered from any scope's cache.
    RateLimitedCache,
    /// Over the rate limit; answered with the best matching memory.
    RateLimitedMemory,
    /// Answered by the provider.
    Completed,
}

impl ThinkOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CacheHit => "cache_hit",
            Self::RateLimitedCache => "rate_limited_cache",
            Self::RateLimitedMemory => "rate_limited_memory",
            Self::Completed => "completed",
        }
    }

    pub fn is_cache_hit(&self) -> bool {
        matches!(self, Self::CacheHit | Self::RateLimitedCache)
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimitedCache | Self::RateLimitedMemory)
    }
}

/// Everything `think_detailed` knows about one answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThinkResult {
    pub response: String,
    pub outcome: ThinkOutcome,
    /// Set when a router served the call.
    pub route: Option<RouteDecision>,
    pub memories_used: usize,
    pub scope: String,
    pub query_hash: String,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

/// Orchestrates one provider and one store.
pub struct Gateway {
    mind: Arc<dyn Mind>,
    provider: Arc<dyn Provider>,
    config: GatewayConfig,
    lanes: RequestLanes,
}

impl Gateway {
    /// Gateway with default settings (1 h cache, no rate limit).
    pub fn new(mind: Arc<dyn Mind>, provider: Arc<dyn Provider>) -> Self {
        Self {
            mind,
            provider,
            config: GatewayConfig::default(),
            lanes: RequestLanes::new(),
        }
    }

    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Build store, providers and gateway from application config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mind = kore_bridge_store::create_mind(&config.store)?;
        let provider = kore_bridge_model_gateway::create_provider_from_config(config)?;
        Ok(Self::new(mind, provider).with_config(config.gateway.clone()))
    }

    pub fn mind(&self) -> &Arc<dyn Mind> {
        &self.mind
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Scope for a requester: the user id, or the configured default.
    pub fn scope_for(&self, user: Option<&str>) -> String {
        match user.filter(|u| !u.is_empty()) {
            Some(user) => user.to_string(),
            None => self.config.default_scope.clone(),
        }
    }

    /// Answer `prompt`; see [`Gateway::think_detailed`].
    pub async fn think(&self, prompt: &str, options: ThinkOptions) -> Result<String> {
        Ok(self.think_detailed(prompt, options).await?.response)
    }

    /// Answer `prompt` and report how the answer was produced.
    ///
    /// Provider and store errors propagate unchanged; trace failures are
    /// logged and dropped.
    pub async fn think_detailed(&self, prompt: &str, options: ThinkOptions) -> Result<ThinkResult> {
        let started = Instant::now();
        let query = Query::new(prompt);
        let scope = self.scope_for(options.user.as_deref());
        let caching = options.use_cache && self.config.caching_enabled();

        let _lane = if self.config.single_flight {
            Some(self.lanes.acquire(&query.hash, &scope).await)
        } else {
            None
        };

        if caching {
            if let Some(entry) = self.mind.find(&query.hash, &scope).await? {
                if entry.is_fresh(Utc::now()) {
                    self.mind.record_hit(&entry.id).await?;
                    tracing::debug!(hash = %query.hash, scope = %scope, "Cache hit");
                    return Ok(self
                        .finish(&query, scope, entry.response, ThinkOutcome::CacheHit, None, 0, started)
                        .await);
                }
                tracing::debug!(hash = %query.hash, scope = %scope, "Cache entry expired");
            }
        }

        if options.rate_limit && self.config.rate_limiting_enabled() {
            let count = self
                .mind
                .count_since(&query.hash, &scope, self.config.rate_window())
                .await?;
            if count >= self.config.rate_limit as usize {
                tracing::debug!(hash = %query.hash, scope = %scope, count, "Rate limited");

                if let Some(entry) = self.mind.find_any(&query.hash).await? {
                    self.mind.record_hit(&entry.id).await?;
                    return Ok(self
                        .finish(&query, scope, entry.response, ThinkOutcome::RateLimitedCache, None, 0, started)
                        .await);
                }

                let best = self.mind.recall(&query.raw, 1, Some(&scope)).await?;
                if let Some(memory) = best.into_iter().next() {
                    return Ok(self
                        .finish(&query, scope, memory.content, ThinkOutcome::RateLimitedMemory, None, 1, started)
                        .await);
                }

                tracing::debug!(hash = %query.hash, scope = %scope, "No fallback, calling provider");
            }

            self.mind.log_query(&query.hash, &scope, Utc::now()).await?;
        }

        let memories = self
            .mind
            .recall(&query.raw, self.config.recall_limit, Some(&scope))
            .await?;
        let identity = self.mind.identity().await?;
        let context = build_context(&identity, &memories, options.system.as_deref());

        let messages = [ChatMessage::system(context), ChatMessage::user(query.raw.as_str())];
        let completion = self.provider.complete(&messages).await?;

        if caching {
            let entry = CacheEntry::new(
                &query.hash,
                &scope,
                query.raw.as_str(),
                completion.content.as_str(),
                self.config.cache_ttl_secs,
            );
            self.mind.put(entry).await?;
        }

        if options.remember {
            self.remember_exchange(&query.raw, &completion.content, &scope).await?;
        }

        Ok(self
            .finish(
                &query,
                scope,
                completion.content,
                ThinkOutcome::Completed,
                completion.route,
                memories.len(),
                started,
            )
            .await)
    }

    async fn remember_exchange(&self, prompt: &str, response: &str, scope: &str) -> Result<()> {
        let excerpt = self.config.memory_excerpt_chars;
        self.mind
            .store(
                NewMemory::new(format!("User: {}", truncate_chars(prompt, excerpt)))
                    .with_kind(MemoryKind::Episodic)
                    .with_source(scope)
                    .with_tags(["conversation", "user-input"]),
            )
            .await?;
        self.mind
            .store(
                NewMemory::new(format!("Response: {}", truncate_chars(response, excerpt)))
                    .with_kind(MemoryKind::Episodic)
                    .with_source(scope)
                    .with_tags(["conversation", "response"]),
            )
            .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish(
        &self,
        query: &Query,
        scope: String,
        response: String,
        outcome: ThinkOutcome,
        route: Option<RouteDecision>,
        memories_used: usize,
        started: Instant,
    ) -> ThinkResult {
        let elapsed = started.elapsed();
        let route_key = route.as_ref().map(|r| r.key.as_str());
        track_think(outcome, route_key, elapsed);

        if self.config.enable_traces {
            let trace = Trace::new(THINK_OPERATION, scope.as_str())
                .with_io(&query.raw, &response)
                .with_duration_ms(elapsed.as_secs_f64() * 1000.0)
                .with_metadata(serde_json::json!({
                    "cache_hit": outcome.is_cache_hit(),
                    "rate_limited": outcome.is_rate_limited(),
                    "memories_used": memories_used,
                    "outcome": outcome.as_str(),
                    "route": route_key,
                }));
            if let Err(e) = self.mind.save_trace(trace).await {
                track_trace_failure();
                tracing::warn!(error = %e, scope = %scope, "Failed to save trace");
            }
        }

        ThinkResult {
            response,
            outcome,
            route,
            memories_used,
            scope,
            query_hash: query.hash.clone(),
            elapsed,
        }
    }

    /// Store a memory directly.
    pub async fn observe(&self, memory: NewMemory) -> Result<Memory> {
        self.mind.store(memory).await
    }

    /// Distill an identity from stored memories and save it.
    pub async fn reflect(&self) -> Result<Identity> {
        let memories = self.mind.recall("", REFLECT_MEMORY_LIMIT, None).await?;

        let identity = if memories.is_empty() {
            Identity::with_summary(EMPTY_SUMMARY)
        } else {
            let summary = self
                .provider
                .summarize(&format_memories(&memories), REFLECT_INSTRUCTION)
                .await?;
            identity_or_fallback(&summary.content)
        };

        self.mind.set_identity(identity.clone()).await?;
        tracing::info!(memories = memories.len(), traits = identity.traits.len(), "Identity updated");
        Ok(identity)
    }
}
