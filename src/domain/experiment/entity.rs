//! Experiment definitions

use serde::{Deserialize, Serialize};

/// One arm of an experiment, bound to a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Relative share of new assignments; zero disables the variant
    pub weight: u32,
    /// Name of the provider requests in this variant are pinned to
    pub provider: String,
}

impl Variant {
    pub fn new(id: impl Into<String>, weight: u32, provider: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            weight,
            provider: provider.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_active(&self) -> bool {
        self.weight > 0
    }
}

/// A controlled experiment over providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Declared order is significant for bucket mapping
    pub variants: Vec<Variant>,
}

fn default_true() -> bool {
    true
}

impl ExperimentDefinition {
    pub fn new(id: impl Into<String>, variants: Vec<Variant>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            active: true,
            variants,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Variants with a positive weight, in declared order
    pub fn active_variants(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter().filter(|v| v.is_active())
    }

    /// Sum of active variant weights
    pub fn total_weight(&self) -> u64 {
        self.active_variants().map(|v| v.weight as u64).sum()
    }

    /// Whether new assignments can be made
    pub fn is_assignable(&self) -> bool {
        self.active && self.total_weight() > 0
    }

    pub fn variant(&self, id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    pub fn active_variant(&self, id: &str) -> Option<&Variant> {
        self.variant(id).filter(|v| v.is_active())
    }

    /// Map a bucket in `0..total_weight()` onto the cumulative weight
    /// distribution: the first variant whose running total exceeds `bucket`.
    pub fn variant_for_bucket(&self, bucket: u64) -> Option<&Variant> {
        let mut cumulative = 0u64;

        self.active_variants().find(|variant| {
            cumulative += variant.weight as u64;
            bucket < cumulative
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn experiment() -> ExperimentDefinition {
        ExperimentDefinition::new(
            "sdk-comparison",
            vec![
                Variant::new("control", 70, "openai"),
                Variant::new("paused", 0, "openai"),
                Variant::new("treatment", 30, "anthropic"),
            ],
        )
    }

    #[test]
    fn test_total_weight_ignores_zero_weight_variants() {
        let experiment = experiment();

        assert_eq!(experiment.total_weight(), 100);
        assert_eq!(experiment.active_variants().count(), 2);
        assert!(experiment.is_assignable());
    }

    #[test]
    fn test_variant_for_bucket_uses_cumulative_weights() {
        let experiment = experiment();

        assert_eq!(experiment.variant_for_bucket(0).unwrap().id, "control");
        assert_eq!(experiment.variant_for_bucket(69).unwrap().id, "control");
        assert_eq!(experiment.variant_for_bucket(70).unwrap().id, "treatment");
        assert_eq!(experiment.variant_for_bucket(99).unwrap().id, "treatment");
        assert!(experiment.variant_for_bucket(100).is_none());
    }

    #[test]
    fn test_inactive_or_weightless_experiment_is_not_assignable() {
        assert!(!experiment().inactive().is_assignable());

        let weightless =
            ExperimentDefinition::new("empty", vec![Variant::new("a", 0, "openai")]);
        assert!(!weightless.is_assignable());
    }

    #[test]
    fn test_active_variant_lookup() {
        let experiment = experiment();

        assert!(experiment.active_variant("control").is_some());
        assert!(experiment.variant("paused").is_some());
        assert!(experiment.active_variant("paused").is_none());
    }
}
