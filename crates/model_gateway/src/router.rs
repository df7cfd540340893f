//! Keyed provider routing.
//!
//! A router is itself a [`Provider`]: it picks one registered backend per
//! call and reports the choice in the returned [`Completion`].

use async_trait::async_trait;
use std::sync::Arc;

use kore_bridge_core::{
    traits::Provider,
    types::{ChatMessage, Completion, RouteDecision},
    Error, Result,
};

/// Key used for short requests by the default decision.
pub const FAST: &str = "fast";
/// Key used for long requests, and preferred for summaries.
pub const QUALITY: &str = "quality";
/// Character count at which the default decision switches to `QUALITY`.
pub const DEFAULT_LENGTH_THRESHOLD: usize = 500;

/// Decision function: messages in, provider key out.
pub type RouteFn = Arc<dyn Fn(&[ChatMessage]) -> String + Send + Sync>;

/// `"fast"` below `threshold` total content characters, `"quality"` otherwise.
pub fn length_route(threshold: usize) -> RouteFn {
    Arc::new(move |messages: &[ChatMessage]| {
        let total: usize = messages.iter().map(|m| m.content.chars().count()).sum();
        let key = if total < threshold { FAST } else { QUALITY };
        key.to_string()
    })
}

/// Ordered `key -> Provider` table with a fallback key.
#[derive(Clone)]
pub struct ProviderTable {
    entries: Vec<(String, Arc<dyn Provider>)>,
    default_idx: usize,
}

impl ProviderTable {
    /// Fails with a configuration error on an empty or duplicated table.
    /// The default is the first registered key.
    pub fn new(entries: Vec<(String, Arc<dyn Provider>)>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::configuration("router needs at least one provider"));
        }
        for (i, (key, _)) in entries.iter().enumerate() {
            if entries[..i].iter().any(|(k, _)| k == key) {
                return Err(Error::configuration(format!("duplicate provider key '{}'", key)));
            }
        }
        Ok(Self {
            entries,
            default_idx: 0,
        })
    }

    /// Replace the fallback key; it must be registered.
    pub fn set_default(&mut self, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        match self.entries.iter().position(|(k, _)| *k == key) {
            Some(idx) => {
                self.default_idx = idx;
                Ok(())
            }
            None => Err(Error::configuration(format!(
                "default provider '{}' is not registered",
                key
            ))),
        }
    }

    pub fn default_key(&self) -> &str {
        &self.entries[self.default_idx].0
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn Provider>> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, p)| p)
    }

    /// The provider registered under `key`, or the default one.
    pub fn resolve(&self, key: &str) -> (&str, &Arc<dyn Provider>) {
        let (k, p) = self
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .unwrap_or(&self.entries[self.default_idx]);
        (k.as_str(), p)
    }

    /// Target for summaries: `"quality"` when registered, else the default.
    pub async fn summarize(&self, text: &str, instruction: &str) -> Result<Completion> {
        let (key, provider) = self.resolve(QUALITY);
        tracing::debug!(route = %key, "Routing summary");
        let completion = provider.summarize(text, instruction).await?;
        Ok(completion.routed(RouteDecision::new(key)))
    }
}

impl std::fmt::Debug for ProviderTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderTable")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .field("default_key", &self.default_key())
            .finish()
    }
}

/// Routes each request with a decision function.
///
/// The default decision is [`length_route`] with a 500 character threshold.
/// A decision naming an unregistered key falls back to the default key.
pub struct RouterProvider {
    table: ProviderTable,
    route_fn: RouteFn,
}

impl RouterProvider {
    pub fn new(providers: Vec<(String, Arc<dyn Provider>)>) -> Result<Self> {
        Ok(Self {
            table: ProviderTable::new(providers)?,
            route_fn: length_route(DEFAULT_LENGTH_THRESHOLD),
        })
    }

    /// Replace the decision function.
    pub fn with_route_fn<F>(mut self, route_fn: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> String + Send + Sync + 'static,
    {
        self.route_fn = Arc::new(route_fn);
        self
    }

    /// Keep the length heuristic with a different threshold.
    pub fn with_length_threshold(mut self, threshold: usize) -> Self {
        self.route_fn = length_route(threshold);
        self
    }

    pub fn with_default(mut self, key: impl Into<String>) -> Result<Self> {
        self.table.set_default(key)?;
        Ok(self)
    }

    pub fn table(&self) -> &ProviderTable {
        &self.table
    }

    /// The key a request would be sent to, after default fallback.
    pub fn route(&self, messages: &[ChatMessage]) -> String {
        let wanted = (self.route_fn)(messages);
        let (key, _) = self.table.resolve(&wanted);
        if key != wanted {
            tracing::debug!(wanted = %wanted, fallback = %key, "Unknown route, using default");
        }
        key.to_string()
    }
}

#[async_trait]
impl Provider for RouterProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion> {
        let key = self.route(messages);
        let (key, provider) = self.table.resolve(&key);
        tracing::debug!(route = %key, "Routing completion");
        let completion = provider.complete(messages).await?;
        Ok(completion.routed(RouteDecision::new(key)))
    }

    async fn summarize(&self, text: &str, instruction: &str) -> Result<Completion> {
        self.table.summarize(text, instruction).await
    }
}
