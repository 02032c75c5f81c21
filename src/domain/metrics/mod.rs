//! Per-provider request metrics

mod provider_metrics;

pub use provider_metrics::{HealthCheckRecord, ProviderMetrics, ProviderMetricsSnapshot};
