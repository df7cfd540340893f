//! Routing on an external complexity classification.

use async_trait::async_trait;
use std::sync::Arc;

use kore_bridge_core::{
    traits::{ComplexityClassifier, Provider},
    types::{ChatMessage, Completion, RouteDecision},
    Error, Result,
};

use crate::router::{ProviderTable, FAST, QUALITY};

/// Mapping from complexity level to provider key; index is the level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelMapping {
    keys: Vec<String>,
}

impl Default for LevelMapping {
    /// 0 and 1 go to `"fast"`, 2 and 3 to `"quality"`.
    fn default() -> Self {
        Self::new([FAST, FAST, QUALITY, QUALITY])
    }
}

impl LevelMapping {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Key for `level`; unmapped levels go to `"quality"`.
    pub fn key_for(&self, level: u8) -> &str {
        self.keys
            .get(level as usize)
            .map(String::as_str)
            .unwrap_or(QUALITY)
    }
}

/// Router that asks a [`ComplexityClassifier`] about the last user message.
///
/// Without a classifier every completion fails with
/// [`Error::ClassifierUnavailable`]; there is no silent fallback to the
/// length heuristic.
pub struct ComplexityRouter {
    table: ProviderTable,
    classifier: Option<Arc<dyn ComplexityClassifier>>,
    levels: LevelMapping,
}

impl ComplexityRouter {
    pub fn new(
        providers: Vec<(String, Arc<dyn Provider>)>,
        classifier: Option<Arc<dyn ComplexityClassifier>>,
    ) -> Result<Self> {
        Ok(Self {
            table: ProviderTable::new(providers)?,
            classifier,
            levels: LevelMapping::default(),
        })
    }

    pub fn with_levels(mut self, levels: LevelMapping) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_default(mut self, key: impl Into<String>) -> Result<Self> {
        self.table.set_default(key)?;
        Ok(self)
    }

    pub fn table(&self) -> &ProviderTable {
        &self.table
    }

    /// Classify the request and pick a registered key.
    pub async fn route(&self, messages: &[ChatMessage]) -> Result<RouteDecision> {
        let classifier = self.classifier.as_ref().ok_or_else(|| {
            Error::ClassifierUnavailable("no complexity classifier configured".into())
        })?;

        let text = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let classification = classifier.classify(text).await?;
        let wanted = self.levels.key_for(classification.level);
        let (key, _) = self.table.resolve(wanted);

        tracing::debug!(
            level = classification.level,
            wanted = %wanted,
            route = %key,
            "Complexity routing decision"
        );

        Ok(RouteDecision::new(key).with_classification(classification))
    }
}

#[async_trait]
impl Provider for ComplexityRouter {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion> {
        let decision = self.route(messages).await?;
        let (_, provider) = self.table.resolve(&decision.key);
        let completion = provider.complete(messages).await?;
        Ok(completion.routed(decision))
    }

    async fn summarize(&self, text: &str, instruction: &str) -> Result<Completion> {
        self.table.summarize(text, instruction).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CallableProvider;
    use kore_bridge_core::mocks::FixedClassifier;

    fn table() -> Vec<(String, Arc<dyn Provider>)> {
        vec![
            ("fast".to_string(), Arc::new(CallableProvider::echo("FAST")) as Arc<dyn Provider>),
            ("quality".to_string(), Arc::new(CallableProvider::echo("QUALITY")) as Arc<dyn Provider>),
        ]
    }

    fn classified(level: u8) -> (ComplexityRouter, Arc<FixedClassifier>) {
        let classifier = Arc::new(FixedClassifier::new(level));
        let router = ComplexityRouter::new(table(), Some(classifier.clone() as Arc<dyn ComplexityClassifier>)).unwrap();
        (router, classifier)
    }

    #[tokio::test]
    async fn test_default_level_mapping() {
        for (level, expected) in [(0, "fast"), (1, "fast"), (2, "quality"), (3, "quality")] {
            let (router, _) = classified(level);
            let out = router.complete(&[ChatMessage::user("hi")]).await.unwrap();
            let route = out.route.unwrap();
            assert_eq!(route.key, expected, "level {}", level);
            assert_eq!(route.classification.unwrap().level, level);
        }
    }

    #[tokio::test]
    async fn test_unmapped_level_goes_to_quality() {
        let (router, _) = classified(9);
        let out = router.complete(&[ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(out.route.unwrap().key, "quality");
    }

    #[tokio::test]
    async fn test_unregistered_mapped_key_uses_default() {
        let (router, _) = classified(0);
        let router = router.with_levels(LevelMapping::new(["local"]));
        let out = router.complete(&[ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(out.route.unwrap().key, "fast");
    }

    #[tokio::test]
    async fn test_missing_classifier_fails_on_first_route() {
        let router = ComplexityRouter::new(table(), None).unwrap();
        let err = router.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, Error::ClassifierUnavailable(_)));
    }

    #[tokio::test]
    async fn test_classifies_last_user_message_only() {
        let (router, classifier) = classified(1);
        let decision = router
            .route(&[
                ChatMessage::system("x".repeat(1000)),
                ChatMessage::user("short question"),
            ])
            .await
            .unwrap();
        assert_eq!(decision.key, "fast");
        assert_eq!(classifier.call_count(), 1);
        let metadata = decision.classification.unwrap().metadata;
        assert_eq!(metadata["chars"], 14);
    }

    #[tokio::test]
    async fn test_summarize_needs_no_classifier() {
        let router = ComplexityRouter::new(table(), None).unwrap();
        let out = router.summarize("text", "instruction").await.unwrap();
        assert_eq!(out.route.unwrap().key, "quality");
    }
}
