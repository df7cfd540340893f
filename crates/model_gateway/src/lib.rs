//! Model gateway for kore-bridge.
//!
//! This crate provides:
//! - In-process and Rig-backed providers
//! - Keyed routing (length heuristic or custom decision)
//! - Complexity-classifier routing
//! - A factory building providers from configuration

pub mod callable;
pub mod complexity;
pub mod rig_client;
pub mod router;

pub use callable::CallableProvider;
pub use complexity::{ComplexityRouter, LevelMapping};
pub use rig_client::{RigBackend, RigConfig, RigProvider};
pub use router::{length_route, ProviderTable, RouterProvider};

use std::sync::Arc;

use kore_bridge_core::{
    config::{AppConfig, ProviderSpec},
    traits::{ComplexityClassifier, Provider},
    Error, Result,
};

/// Build one provider from its spec.
pub fn create_provider(spec: &ProviderSpec) -> Result<Arc<dyn Provider>> {
    let provider: Arc<dyn Provider> = match spec {
        ProviderSpec::Echo { prefix } => Arc::new(CallableProvider::echo(prefix.clone())),
        ProviderSpec::OpenAi { model, temperature } => Arc::new(RigProvider::new(
            RigConfig::openai(model).with_temperature(*temperature),
        )),
        ProviderSpec::Anthropic { model, temperature } => Arc::new(RigProvider::new(
            RigConfig::anthropic(model).with_temperature(*temperature),
        )),
        ProviderSpec::Ollama { model, temperature } => Arc::new(RigProvider::new(
            RigConfig::ollama(model).with_temperature(*temperature),
        )),
    };
    Ok(provider)
}

fn keyed_providers(config: &AppConfig) -> Result<Vec<(String, Arc<dyn Provider>)>> {
    if config.providers.is_empty() {
        return Err(Error::configuration("no providers configured"));
    }
    config
        .providers
        .iter()
        .map(|(key, spec)| -> Result<(String, Arc<dyn Provider>)> {
            Ok((key.clone(), create_provider(spec)?))
        })
        .collect()
}

/// Build the provider described by `config.providers`.
///
/// A single entry is returned as-is; several entries are wrapped in a
/// length-routing [`RouterProvider`]. Keys are registered in name order, so
/// without `router.default_key` the alphabetically first key is the default.
pub fn create_provider_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>> {
    let mut providers = keyed_providers(config)?;
    if providers.len() == 1 && config.router.default_key.is_none() {
        let (key, provider) = providers.remove(0);
        tracing::info!(provider = %key, "Using single provider");
        return Ok(provider);
    }

    let mut router = RouterProvider::new(providers)?
        .with_length_threshold(config.router.length_threshold);
    if let Some(default) = &config.router.default_key {
        router = router.with_default(default.clone())?;
    }
    tracing::info!(
        keys = ?router.table().keys().collect::<Vec<_>>(),
        default = %router.table().default_key(),
        "Built length router"
    );
    Ok(Arc::new(router))
}

/// Build a [`ComplexityRouter`] over `config.providers`.
pub fn create_complexity_router(
    config: &AppConfig,
    classifier: Option<Arc<dyn ComplexityClassifier>>,
) -> Result<ComplexityRouter> {
    let mut router = ComplexityRouter::new(keyed_providers(config)?, classifier)?
        .with_levels(LevelMapping::new(config.router.complexity_keys.iter().cloned()));
    if let Some(default) = &config.router.default_key {
        router = router.with_default(default.clone())?;
    }
    Ok(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kore_bridge_core::mocks::FixedClassifier;
    use kore_bridge_core::ChatMessage;

    fn echo(prefix: &str) -> ProviderSpec {
        ProviderSpec::Echo {
            prefix: prefix.to_string(),
        }
    }

    #[test]
    fn test_empty_config_rejected() {
        let err = create_provider_from_config(&AppConfig::default()).err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_single_provider_is_unwrapped() {
        let mut config = AppConfig::default();
        config.providers.insert("local".into(), echo("LOCAL"));

        let provider = create_provider_from_config(&config).unwrap();
        let out = provider.complete(&[ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(out.content, "LOCAL: hi");
        assert!(out.route.is_none());
    }

    #[tokio::test]
    async fn test_several_providers_build_router() {
        let mut config = AppConfig::default();
        config.providers.insert("fast".into(), echo("FAST"));
        config.providers.insert("quality".into(), echo("QUALITY"));
        config.router.length_threshold = 10;

        let provider = create_provider_from_config(&config).unwrap();
        let out = provider
            .complete(&[ChatMessage::user("a much longer question")])
            .await
            .unwrap();
        assert_eq!(out.route.unwrap().key, "quality");
    }

    #[test]
    fn test_unknown_default_key_rejected() {
        let mut config = AppConfig::default();
        config.providers.insert("fast".into(), echo("FAST"));
        config.router.default_key = Some("missing".into());
        assert!(create_provider_from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_complexity_router_from_config() {
        let mut config = AppConfig::default();
        config.providers.insert("fast".into(), echo("FAST"));
        config.providers.insert("quality".into(), echo("QUALITY"));
        config.router.complexity_keys = vec!["quality".into()];

        let classifier: Arc<dyn ComplexityClassifier> = Arc::new(FixedClassifier::new(0));
        let router = create_complexity_router(&config, Some(classifier)).unwrap();
        let out = router.complete(&[ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(out.content, "QUALITY: hi");
    }
}
