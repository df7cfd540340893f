//! Metrics implementation using Prometheus.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

use kore_bridge_core::{Error, Result};

use crate::gateway::ThinkOutcome;

/// Initialize Prometheus recorder and return the handle.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::internal(format!("Failed to install Prometheus recorder: {}", e)))?;

    tracing::info!("Prometheus metrics recorder initialized");
    Ok(handle)
}

/// Count one finished `think` and record its latency.
pub fn track_think(outcome: ThinkOutcome, route: Option<&str>, elapsed: Duration) {
    metrics::counter!(
        "kore_think_total",
        "outcome" => outcome.as_str(),
        "route" => route.unwrap_or("none").to_string()
    )
    .increment(1);

    metrics::histogram!("kore_think_duration_seconds", "outcome" => outcome.as_str())
        .record(elapsed.as_secs_f64());
}

/// Count a trace write that failed and was dropped.
pub fn track_trace_failure() {
    metrics::counter!("kore_trace_failures_total").increment(1);
}
