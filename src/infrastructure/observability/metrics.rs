//! Prometheus metrics for dispatch, circuits, cache and experiments

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;
use crate::domain::CircuitStatus;

/// Handle for rendering the Prometheus exposition text
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

impl PrometheusMetrics {
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Install the global Prometheus recorder
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("llm_orchestrator_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
            tracing::debug!("Prometheus metrics initialized");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Outcome label for one provider attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure,
    Timeout,
    Rejected,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Timeout => "timeout",
            Self::Rejected => "rejected",
        }
    }
}

/// One attempt against a provider
pub fn record_provider_request(
    provider: &str,
    operation: &'static str,
    outcome: AttemptOutcome,
    duration: Duration,
) {
    let labels = [
        ("provider", provider.to_string()),
        ("operation", operation.to_string()),
        ("outcome", outcome.as_str().to_string()),
    ];

    counter!("llm_provider_requests_total", &labels).increment(1);
    histogram!("llm_provider_request_duration_seconds", &labels).record(duration.as_secs_f64());
}

pub fn record_tokens(provider: &str, prompt_tokens: u32, completion_tokens: u32) {
    let labels = [("provider", provider.to_string())];

    counter!("llm_prompt_tokens_total", &labels).increment(u64::from(prompt_tokens));
    counter!("llm_completion_tokens_total", &labels).increment(u64::from(completion_tokens));
}

pub fn record_circuit_transition(provider: &str, from: CircuitStatus, to: CircuitStatus) {
    counter!(
        "llm_circuit_transitions_total",
        "provider" => provider.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);

    let open = if to == CircuitStatus::Closed { 0.0 } else { 1.0 };
    gauge!("llm_circuit_open", "provider" => provider.to_string()).set(open);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("llm_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_experiment_result(experiment: &str, variant: &str, success: bool) {
    counter!(
        "llm_experiment_results_total",
        "experiment" => experiment.to_string(),
        "variant" => variant.to_string(),
        "success" => if success { "true" } else { "false" }
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_metrics_install_nothing() {
        assert!(init_metrics(&MetricsConfig { enabled: false }).is_none());
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_provider_request("openai", "complete", AttemptOutcome::Success, Duration::from_millis(5));
        record_circuit_transition("openai", CircuitStatus::Closed, CircuitStatus::Open);
        record_cache_lookup(true);
        record_experiment_result("exp", "a", false);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(AttemptOutcome::Timeout.as_str(), "timeout");
        assert_eq!(AttemptOutcome::Rejected.as_str(), "rejected");
    }
}
