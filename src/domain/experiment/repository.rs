//! Experiment repository traits

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::{ExperimentResult, VariantAssignment};
use crate::domain::DomainError;

/// Storage for sticky variant assignments
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Finds the assignment for a (experiment, user) pair
    async fn find(
        &self,
        experiment_id: &str,
        user_id: &str,
    ) -> Result<Option<VariantAssignment>, DomainError>;

    /// Stores `assignment` unless one already exists for the pair, returning
    /// whichever assignment is stored afterwards
    async fn insert_if_absent(
        &self,
        assignment: VariantAssignment,
    ) -> Result<VariantAssignment, DomainError>;

    /// Replaces `stale` with `assignment` only if `stale` is still the stored
    /// value, returning whichever assignment is stored afterwards
    async fn replace(
        &self,
        stale: &VariantAssignment,
        assignment: VariantAssignment,
    ) -> Result<VariantAssignment, DomainError>;

    /// Number of assignments for an experiment
    async fn count(&self, experiment_id: &str) -> Result<usize, DomainError>;
}

/// Append-only storage for experiment results
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExperimentResultRepository: Send + Sync {
    /// Appends a result
    async fn record(&self, result: ExperimentResult) -> Result<(), DomainError>;

    /// Lists all results of an experiment in recording order
    async fn list(&self, experiment_id: &str) -> Result<Vec<ExperimentResult>, DomainError>;
}
