use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of the most recent active health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthCheckRecord {
    pub healthy: bool,
    pub checked_at: DateTime<Utc>,
}

/// Rolling counters for one provider.
///
/// Counters are independent atomics, so a snapshot taken during dispatch may
/// mix values from adjacent calls but never tears a single counter.
#[derive(Debug, Default)]
pub struct ProviderMetrics {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    total_latency_ms: AtomicU64,
    last_health_check: Mutex<Option<HealthCheckRecord>>,
}

/// Point-in-time copy of [`ProviderMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderMetricsSnapshot {
    pub provider: String,
    pub request_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub average_latency_ms: f64,
    pub last_health_check: Option<HealthCheckRecord>,
}

impl ProviderMetricsSnapshot {
    pub fn success_rate(&self) -> f64 {
        if self.request_count == 0 {
            return 1.0;
        }
        self.success_count as f64 / self.request_count as f64
    }
}

impl ProviderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, latency: Duration) {
        self.record(latency);
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, latency: Duration) {
        self.record(latency);
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record(&self, latency: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms
            .fetch_add(latency.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_health_check(&self, healthy: bool) {
        let record = HealthCheckRecord {
            healthy,
            checked_at: Utc::now(),
        };
        *self
            .last_health_check
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(record);
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.total_latency_ms.store(0, Ordering::Relaxed);
        *self
            .last_health_check
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    pub fn snapshot(&self, provider: &str) -> ProviderMetricsSnapshot {
        let requests = self.requests.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);

        ProviderMetricsSnapshot {
            provider: provider.to_string(),
            request_count: requests,
            success_count: self.successes.load(Ordering::Relaxed),
            failure_count: self.failures.load(Ordering::Relaxed),
            average_latency_ms: if requests == 0 {
                0.0
            } else {
                total_latency as f64 / requests as f64
            },
            last_health_check: *self
                .last_health_check
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_average_latency() {
        let metrics = ProviderMetrics::new();

        metrics.record_success(Duration::from_millis(100));
        metrics.record_success(Duration::from_millis(200));
        metrics.record_failure(Duration::from_millis(300));

        let snapshot = metrics.snapshot("openai");
        assert_eq!(snapshot.provider, "openai");
        assert_eq!(snapshot.request_count, 3);
        assert_eq!(snapshot.success_count, 2);
        assert_eq!(snapshot.failure_count, 1);
        assert!((snapshot.average_latency_ms - 200.0).abs() < f64::EPSILON);
        assert!((snapshot.success_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_clears_everything() {
        let metrics = ProviderMetrics::new();
        metrics.record_failure(Duration::from_millis(10));
        metrics.record_health_check(false);

        metrics.reset();

        let snapshot = metrics.snapshot("p");
        assert_eq!(snapshot.request_count, 0);
        assert_eq!(snapshot.average_latency_ms, 0.0);
        assert!(snapshot.last_health_check.is_none());
    }

    #[test]
    fn test_health_check_recorded() {
        let metrics = ProviderMetrics::new();

        metrics.record_health_check(true);

        let record = metrics.snapshot("p").last_health_check.unwrap();
        assert!(record.healthy);
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = std::sync::Arc::new(ProviderMetrics::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = std::sync::Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.record_success(Duration::from_millis(1));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.request_count(), 800);
    }
}
