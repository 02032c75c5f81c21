//! Structural validation of experiment definitions

use std::collections::HashSet;

use thiserror::Error;

use super::ExperimentDefinition;

/// Problems found in an experiment definition
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExperimentValidationError {
    #[error("Experiment ID cannot be empty")]
    EmptyId,

    #[error("Experiment '{0}' has no variants")]
    NoVariants(String),

    #[error("Experiment '{0}' has a variant with an empty ID")]
    EmptyVariantId(String),

    #[error("Experiment '{experiment}' declares variant '{variant}' more than once")]
    DuplicateVariantId { experiment: String, variant: String },

    #[error("Variant '{variant}' of experiment '{experiment}' is bound to unknown provider '{provider}'")]
    UnknownProvider {
        experiment: String,
        variant: String,
        provider: String,
    },

    #[error("Experiment '{0}' has zero total weight and will never assign users")]
    ZeroTotalWeight(String),
}

impl ExperimentValidationError {
    /// Warnings leave the experiment usable; everything else is an error
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::ZeroTotalWeight(_))
    }
}

/// Validate an experiment against the set of registered provider names
pub fn validate_experiment(
    experiment: &ExperimentDefinition,
    providers: &HashSet<&str>,
) -> Vec<ExperimentValidationError> {
    let mut issues = Vec::new();
    let id = experiment.id.clone();

    if experiment.id.trim().is_empty() {
        issues.push(ExperimentValidationError::EmptyId);
    }

    if experiment.variants.is_empty() {
        issues.push(ExperimentValidationError::NoVariants(id));
        return issues;
    }

    let mut seen = HashSet::new();
    for variant in &experiment.variants {
        if variant.id.trim().is_empty() {
            issues.push(ExperimentValidationError::EmptyVariantId(id.clone()));
        } else if !seen.insert(variant.id.as_str()) {
            issues.push(ExperimentValidationError::DuplicateVariantId {
                experiment: id.clone(),
                variant: variant.id.clone(),
            });
        }

        if !providers.contains(variant.provider.as_str()) {
            issues.push(ExperimentValidationError::UnknownProvider {
                experiment: id.clone(),
                variant: variant.id.clone(),
                provider: variant.provider.clone(),
            });
        }
    }

    if experiment.total_weight() == 0 {
        issues.push(ExperimentValidationError::ZeroTotalWeight(id));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::Variant;

    #[test]
    fn test_valid_experiment_has_no_issues() {
        let experiment = ExperimentDefinition::new(
            "exp",
            vec![Variant::new("a", 50, "openai"), Variant::new("b", 50, "anthropic")],
        );
        let providers = HashSet::from(["openai", "anthropic"]);

        assert!(validate_experiment(&experiment, &providers).is_empty());
    }

    #[test]
    fn test_reports_duplicates_and_unknown_providers() {
        let experiment = ExperimentDefinition::new(
            "exp",
            vec![Variant::new("a", 50, "openai"), Variant::new("a", 50, "missing")],
        );
        let providers = HashSet::from(["openai"]);

        let issues = validate_experiment(&experiment, &providers);

        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| !i.is_warning()));
        assert!(matches!(issues[0], ExperimentValidationError::DuplicateVariantId { .. }));
        assert!(matches!(issues[1], ExperimentValidationError::UnknownProvider { .. }));
    }

    #[test]
    fn test_zero_weight_is_warning() {
        let experiment = ExperimentDefinition::new("exp", vec![Variant::new("a", 0, "openai")]);
        let providers = HashSet::from(["openai"]);

        let issues = validate_experiment(&experiment, &providers);

        assert_eq!(issues, vec![ExperimentValidationError::ZeroTotalWeight("exp".to_string())]);
        assert!(issues[0].is_warning());
    }
}
