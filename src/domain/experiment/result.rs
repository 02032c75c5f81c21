//! Recorded experiment outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::VariantAssignment;

/// Outcome of one task executed under an experiment variant. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub id: String,
    pub experiment_id: String,
    pub variant_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    /// Provider that served the request, if any did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub latency_ms: u64,
    pub tokens_used: u32,
    /// Cost in micro-dollars
    pub cost_micros: i64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ExperimentResult {
    fn from_assignment(assignment: &VariantAssignment, latency_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            experiment_id: assignment.experiment_id.clone(),
            variant_id: assignment.variant_id.clone(),
            user_id: assignment.user_id.clone(),
            organization_id: assignment.organization_id.clone(),
            provider: None,
            latency_ms,
            tokens_used: 0,
            cost_micros: 0,
            success: false,
            error: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn success(
        assignment: &VariantAssignment,
        provider: impl Into<String>,
        latency_ms: u64,
        tokens_used: u32,
        cost_micros: i64,
    ) -> Self {
        Self {
            provider: Some(provider.into()),
            tokens_used,
            cost_micros,
            success: true,
            ..Self::from_assignment(assignment, latency_ms)
        }
    }

    pub fn failure(assignment: &VariantAssignment, latency_ms: u64, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::from_assignment(assignment, latency_ms)
        }
    }

    pub fn cost_usd(&self) -> f64 {
        self.cost_micros as f64 / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_and_failure_results() {
        let assignment = VariantAssignment::new("exp", "user-1", "b", "provider-b")
            .with_organization(Some("org-1".to_string()));

        let ok = ExperimentResult::success(&assignment, "provider-b", 120, 42, 1_500);
        assert!(ok.success);
        assert_eq!(ok.provider.as_deref(), Some("provider-b"));
        assert_eq!(ok.organization_id.as_deref(), Some("org-1"));
        assert!((ok.cost_usd() - 0.0015).abs() < 1e-9);

        let failed = ExperimentResult::failure(&assignment, 80, "All providers exhausted");
        assert!(!failed.success);
        assert_eq!(failed.tokens_used, 0);
        assert_eq!(failed.error.as_deref(), Some("All providers exhausted"));
        assert_ne!(ok.id, failed.id);
    }
}
