//! Experiment (A/B test) domain

mod assignment;
mod entity;
mod repository;
mod result;
mod summary;
mod validation;

pub use assignment::VariantAssignment;
pub use entity::{ExperimentDefinition, Variant};
pub use repository::{AssignmentRepository, ExperimentResultRepository};
pub use result::ExperimentResult;
pub use summary::{summarize_results, ExperimentSummary, VariantSummary};
pub use validation::{validate_experiment, ExperimentValidationError};

#[cfg(test)]
pub use repository::{MockAssignmentRepository, MockExperimentResultRepository};
