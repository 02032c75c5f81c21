use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{CircuitStatus, HealthCheckRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Every provider is available
    Healthy,
    /// Some providers are unavailable
    Degraded,
    /// No provider is available
    Unhealthy,
}

/// Availability of one provider, derived from its breaker and last health check
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub provider: String,
    pub circuit: CircuitStatus,
    pub available: bool,
    pub success_rate: f64,
    pub last_health_check: Option<HealthCheckRecord>,
}

impl ProviderHealth {
    pub fn new(
        provider: impl Into<String>,
        circuit: CircuitStatus,
        success_rate: f64,
        last_health_check: Option<HealthCheckRecord>,
    ) -> Self {
        let available = circuit != CircuitStatus::Open
            && last_health_check.is_none_or(|check| check.healthy);

        Self {
            provider: provider.into(),
            circuit,
            available,
            success_rate,
            last_health_check,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub providers: Vec<ProviderHealth>,
    pub checked_at: DateTime<Utc>,
}

impl SystemHealth {
    pub fn from_providers(providers: Vec<ProviderHealth>) -> Self {
        let available = providers.iter().filter(|p| p.available).count();

        let status = match available {
            0 => HealthStatus::Unhealthy,
            n if n == providers.len() => HealthStatus::Healthy,
            _ => HealthStatus::Degraded,
        };

        Self {
            status,
            providers,
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(healthy: bool) -> Option<HealthCheckRecord> {
        Some(HealthCheckRecord {
            healthy,
            checked_at: Utc::now(),
        })
    }

    #[test]
    fn test_availability() {
        assert!(ProviderHealth::new("a", CircuitStatus::Closed, 1.0, None).available);
        assert!(ProviderHealth::new("a", CircuitStatus::HalfOpen, 1.0, check(true)).available);
        assert!(!ProviderHealth::new("a", CircuitStatus::Open, 1.0, None).available);
        assert!(!ProviderHealth::new("a", CircuitStatus::Closed, 1.0, check(false)).available);
    }

    #[test]
    fn test_overall_status() {
        let healthy = ProviderHealth::new("a", CircuitStatus::Closed, 1.0, None);
        let down = ProviderHealth::new("b", CircuitStatus::Open, 0.0, None);

        assert_eq!(
            SystemHealth::from_providers(vec![healthy.clone()]).status,
            HealthStatus::Healthy
        );
        assert_eq!(
            SystemHealth::from_providers(vec![healthy, down.clone()]).status,
            HealthStatus::Degraded
        );
        assert_eq!(
            SystemHealth::from_providers(vec![down]).status,
            HealthStatus::Unhealthy
        );
        assert_eq!(
            SystemHealth::from_providers(vec![]).status,
            HealthStatus::Unhealthy
        );
    }
}
