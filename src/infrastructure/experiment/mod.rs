//! Infrastructure layer for experiment A/B testing
//!
//! Provides the assignment hasher, in-memory repositories and the manager
//! that runs completions under a variant.

mod consistent_hashing;
mod in_memory_record_repo;
mod in_memory_repository;
mod manager;

pub use consistent_hashing::ConsistentHasher;
pub use in_memory_record_repo::InMemoryExperimentResultRepository;
pub use in_memory_repository::InMemoryAssignmentRepository;
pub use manager::{AbTestManager, AbTestOutcome};
