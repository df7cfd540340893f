//! A/B comparison of two gateways on the same prompts.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use kore_bridge_core::{
    config::{ExperimentConfig, GatewayConfig},
    traits::{Mind, Provider},
    Result,
};

use crate::gateway::{Gateway, ThinkOptions};

/// One side of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    A,
    B,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }
}

/// Outcome of running one prompt through both variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentResult {
    pub prompt: String,
    pub variant_a: String,
    pub variant_b: String,
    pub time_a_ms: f64,
    pub time_b_ms: f64,
}

impl ExperimentResult {
    /// The quicker variant; ties go to A.
    pub fn faster(&self) -> Variant {
        if self.time_a_ms <= self.time_b_ms {
            Variant::A
        } else {
            Variant::B
        }
    }
}

/// Runs prompts through two gateways with caching and rate limiting
/// bypassed, so both variants always reach their provider.
pub struct Experiment {
    gateway_a: Arc<Gateway>,
    gateway_b: Arc<Gateway>,
    config: ExperimentConfig,
}

impl Experiment {
    pub fn new(gateway_a: Arc<Gateway>, gateway_b: Arc<Gateway>) -> Self {
        Self {
            gateway_a,
            gateway_b,
            config: ExperimentConfig::default(),
        }
    }

    /// Two gateways sharing `mind`, one per provider.
    pub fn with_providers(
        mind: Arc<dyn Mind>,
        provider_a: Arc<dyn Provider>,
        provider_b: Arc<dyn Provider>,
        gateway_config: GatewayConfig,
    ) -> Self {
        let gateway_a = Gateway::new(mind.clone(), provider_a).with_config(gateway_config.clone());
        let gateway_b = Gateway::new(mind, provider_b).with_config(gateway_config);
        Self::new(Arc::new(gateway_a), Arc::new(gateway_b))
    }

    pub fn with_config(mut self, config: ExperimentConfig) -> Self {
        self.config = config;
        self
    }

    fn options(&self, system: Option<&str>, user: Option<&str>) -> ThinkOptions {
        ThinkOptions {
            user: user.map(str::to_string),
            system: system.map(str::to_string),
            remember: self.config.remember,
            use_cache: false,
            rate_limit: false,
        }
    }

    /// Run `prompt` through A, then B, timing each.
    pub async fn run(
        &self,
        prompt: &str,
        system: Option<&str>,
        user: Option<&str>,
    ) -> Result<ExperimentResult> {
        let options = self.options(system, user);

        let started = Instant::now();
        let variant_a = self.gateway_a.think(prompt, options.clone()).await?;
        let time_a_ms = started.elapsed().as_secs_f64() * 1000.0;

        let started = Instant::now();
        let variant_b = self.gateway_b.think(prompt, options).await?;
        let time_b_ms = started.elapsed().as_secs_f64() * 1000.0;

        tracing::debug!(time_a_ms, time_b_ms, "Experiment run complete");

        Ok(ExperimentResult {
            prompt: prompt.to_string(),
            variant_a,
            variant_b,
            time_a_ms,
            time_b_ms,
        })
    }

    /// Run every prompt; results keep the input order.
    ///
    /// Up to `batch_concurrency` prompts are in flight at once. The first
    /// error aborts the batch.
    pub async fn run_batch(
        &self,
        prompts: &[String],
        system: Option<&str>,
        user: Option<&str>,
    ) -> Result<Vec<ExperimentResult>> {
        let concurrency = self.config.batch_concurrency.max(1);
        let results: Vec<Result<ExperimentResult>> = stream::iter(prompts)
            .map(|prompt| self.run(prompt, system, user))
            .buffered(concurrency)
            .collect()
            .await;

        results.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(time_a_ms: f64, time_b_ms: f64) -> ExperimentResult {
        ExperimentResult {
            prompt: "p".into(),
            variant_a: "a".into(),
            variant_b: "b".into(),
            time_a_ms,
            time_b_ms,
        }
    }

    #[test]
    fn test_faster_prefers_a_on_tie() {
        assert_eq!(result(10.0, 10.0).faster(), Variant::A);
        assert_eq!(result(5.0, 10.0).faster(), Variant::A);
        assert_eq!(result(10.0, 5.0).faster(), Variant::B);
        assert_eq!(result(10.0, 10.0).faster().as_str(), "a");
    }
}
