//! Observability: tracing subscriber and Prometheus metrics

mod config;
mod metrics;
mod tracing_setup;

pub use self::config::{MetricsConfig, ObservabilityConfig, TracingConfig};
pub use self::metrics::{
    init_metrics, record_cache_lookup, record_circuit_transition, record_experiment_result,
    record_provider_request, record_tokens, AttemptOutcome, PrometheusMetrics,
};
pub use tracing_setup::{init_tracing, shutdown_tracing};
