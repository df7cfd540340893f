use std::sync::Arc;
use std::time::Duration;

use kore_bridge_core::config::GatewayConfig;
use kore_bridge_core::mocks::MockProvider;
use kore_bridge_core::types::NewMemory;
use kore_bridge_gateway::{Gateway, ThinkOptions, ThinkOutcome};
use kore_bridge_store::InMemoryMind;

fn limited(rate_limit: u32, cache_ttl_secs: f64) -> GatewayConfig {
    GatewayConfig {
        rate_limit,
        cache_ttl_secs,
        ..Default::default()
    }
}

fn uncached() -> ThinkOptions {
    ThinkOptions::default().use_cache(false).remember(false)
}

#[tokio::test]
async fn test_limit_reached_serves_prior_response() {
    let mind = Arc::new(InMemoryMind::new());
    let provider = Arc::new(MockProvider::scripted(vec![
        "first".to_string(),
        "second".to_string(),
        "third".to_string(),
    ]));
    let gateway = Gateway::new(mind.clone(), provider.clone()).with_config(limited(2, 3600.0));

    let first = gateway.think("popular question", ThinkOptions::default().remember(false)).await.unwrap();
    gateway.think("popular question", uncached()).await.unwrap();

    for _ in 0..3 {
        let result = gateway.think_detailed("Popular  question", uncached()).await.unwrap();
        assert_eq!(result.outcome, ThinkOutcome::RateLimitedCache);
        assert_eq!(result.response, first);
    }

    assert_eq!(provider.call_count(), 2);
    // Short-circuited requests are not logged.
    assert_eq!(mind.query_log_len(), 2);
}

#[tokio::test]
async fn test_limited_requests_may_use_another_scope_cache() {
    let mind = Arc::new(InMemoryMind::new());
    let provider = Arc::new(MockProvider::scripted(vec![
        "for bob".to_string(),
        "alice 1".to_string(),
        "alice 2".to_string(),
    ]));
    let gateway = Gateway::new(mind.clone(), provider.clone()).with_config(limited(2, 3600.0));

    gateway.think("shared", ThinkOptions::for_user("bob").remember(false)).await.unwrap();

    let alice = ThinkOptions::for_user("alice").use_cache(false).remember(false);
    assert_eq!(gateway.think("shared", alice.clone()).await.unwrap(), "alice 1");
    assert_eq!(gateway.think("shared", alice.clone()).await.unwrap(), "alice 2");

    let third = gateway.think_detailed("shared", alice).await.unwrap();
    assert_eq!(third.outcome, ThinkOutcome::RateLimitedCache);
    assert_eq!(third.response, "for bob");
    assert_eq!(third.scope, "alice");
    assert_eq!(provider.call_count(), 3);
    assert_eq!(mind.cache_rows()[0].hits, 1);
}

#[tokio::test]
async fn test_memory_fallback_when_nothing_cached() {
    let mind = Arc::new(InMemoryMind::new());
    let provider = Arc::new(MockProvider::echo("LLM"));
    let gateway = Gateway::new(mind.clone(), provider.clone()).with_config(limited(1, 0.0));

    gateway
        .observe(NewMemory::new("Paris is the capital of France").with_source("conversation"))
        .await
        .unwrap();

    let first = gateway.think_detailed("capital of France?", uncached()).await.unwrap();
    assert_eq!(first.outcome, ThinkOutcome::Completed);
    assert_eq!(first.memories_used, 1);

    let second = gateway.think_detailed("capital of France?", uncached()).await.unwrap();
    assert_eq!(second.outcome, ThinkOutcome::RateLimitedMemory);
    assert_eq!(second.response, "Paris is the capital of France");
    assert_eq!(second.memories_used, 1);
    assert_eq!(provider.call_count(), 1);

    let traces = mind.traces().await;
    assert_eq!(traces.len(), 2);
    assert_eq!(traces[1].metadata["rate_limited"], true);
    assert_eq!(traces[1].metadata["cache_hit"], false);
    assert_eq!(traces[1].metadata["memories_used"], 1);
}

#[tokio::test]
async fn test_no_fallback_falls_through_to_provider() {
    let mind = Arc::new(InMemoryMind::new());
    let provider = Arc::new(MockProvider::echo("LLM"));
    let gateway = Gateway::new(mind.clone(), provider.clone()).with_config(limited(1, 0.0));

    for _ in 0..3 {
        let result = gateway.think_detailed("zzz", uncached()).await.unwrap();
        assert_eq!(result.outcome, ThinkOutcome::Completed);
    }

    assert_eq!(provider.call_count(), 3);
    assert_eq!(mind.query_log_len(), 3);
}

#[tokio::test]
async fn test_window_expiry_resets_the_count() {
    let mind = Arc::new(InMemoryMind::new());
    let provider = Arc::new(MockProvider::echo("LLM"));
    let config = GatewayConfig {
        rate_window_secs: 0.05,
        ..limited(1, 0.0)
    };
    let gateway = Gateway::new(mind.clone(), provider.clone()).with_config(config);

    gateway
        .observe(NewMemory::new("cached fact about zebras").with_source("conversation"))
        .await
        .unwrap();

    gateway.think("zebras", uncached()).await.unwrap();
    let limited = gateway.think_detailed("zebras", uncached()).await.unwrap();
    assert!(limited.outcome.is_rate_limited());

    tokio::time::sleep(Duration::from_millis(80)).await;
    let fresh = gateway.think_detailed("zebras", uncached()).await.unwrap();
    assert_eq!(fresh.outcome, ThinkOutcome::Completed);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn test_rate_limit_counts_per_scope() {
    let mind = Arc::new(InMemoryMind::new());
    let provider = Arc::new(MockProvider::echo("LLM"));
    let gateway = Gateway::new(mind, provider.clone()).with_config(limited(1, 0.0));

    gateway.think("q", uncached()).await.unwrap();
    let other = gateway
        .think_detailed("q", ThinkOptions::for_user("carol").use_cache(false).remember(false))
        .await
        .unwrap();

    assert_eq!(other.outcome, ThinkOutcome::Completed);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn test_unbounded_window_limits_without_panicking() {
    let mind = Arc::new(InMemoryMind::new());
    let provider = Arc::new(MockProvider::echo("LLM"));
    let config = GatewayConfig {
        rate_window_secs: 1e20,
        ..limited(1, 0.0)
    };
    let gateway = Gateway::new(mind.clone(), provider.clone()).with_config(config);

    gateway
        .observe(NewMemory::new("hi there from memory").with_source("conversation"))
        .await
        .unwrap();

    gateway.think("hi", uncached()).await.unwrap();
    let second = gateway.think_detailed("hi", uncached()).await.unwrap();

    assert_eq!(second.outcome, ThinkOutcome::RateLimitedMemory);
    assert_eq!(second.response, "hi there from memory");
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_rate_limit_switch_off_skips_count_and_fallback() {
    let mind = Arc::new(InMemoryMind::new());
    let provider = Arc::new(MockProvider::echo("LLM"));
    let gateway = Gateway::new(mind.clone(), provider.clone()).with_config(limited(1, 0.0));

    gateway
        .observe(NewMemory::new("zebras have stripes").with_source("conversation"))
        .await
        .unwrap();

    for _ in 0..3 {
        let result = gateway
            .think_detailed("zebras", uncached().rate_limit(false))
            .await
            .unwrap();
        assert_eq!(result.outcome, ThinkOutcome::Completed);
    }

    assert_eq!(provider.call_count(), 3);
    assert_eq!(mind.query_log_len(), 0);
}
