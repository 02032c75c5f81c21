//! Sticky variant assignments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's assignment to one variant of an experiment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantAssignment {
    pub experiment_id: String,
    pub user_id: String,
    pub variant_id: String,
    /// Provider the variant is bound to
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    pub assigned_at: DateTime<Utc>,
}

impl VariantAssignment {
    pub fn new(
        experiment_id: impl Into<String>,
        user_id: impl Into<String>,
        variant_id: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            user_id: user_id.into(),
            variant_id: variant_id.into(),
            provider: provider.into(),
            organization_id: None,
            assigned_at: Utc::now(),
        }
    }

    pub fn with_organization(mut self, organization_id: Option<String>) -> Self {
        self.organization_id = organization_id;
        self
    }
}
