//! In-memory implementation of the assignment repository

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::experiment::{AssignmentRepository, VariantAssignment};
use crate::domain::DomainError;

type AssignmentKey = (String, String);

/// In-memory assignment repository keyed by (experiment, user)
#[derive(Debug, Default)]
pub struct InMemoryAssignmentRepository {
    assignments: RwLock<HashMap<AssignmentKey, VariantAssignment>>,
}

impl InMemoryAssignmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(assignment: &VariantAssignment) -> AssignmentKey {
        (assignment.experiment_id.clone(), assignment.user_id.clone())
    }
}

#[async_trait]
impl AssignmentRepository for InMemoryAssignmentRepository {
    async fn find(
        &self,
        experiment_id: &str,
        user_id: &str,
    ) -> Result<Option<VariantAssignment>, DomainError> {
        let assignments = self
            .assignments
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))?;

        Ok(assignments
            .get(&(experiment_id.to_string(), user_id.to_string()))
            .cloned())
    }

    async fn insert_if_absent(
        &self,
        assignment: VariantAssignment,
    ) -> Result<VariantAssignment, DomainError> {
        let mut assignments = self
            .assignments
            .write()
            .map_err(|e| DomainError::internal(format!("Failed to acquire write lock: {}", e)))?;

        Ok(assignments
            .entry(Self::key(&assignment))
            .or_insert(assignment)
            .clone())
    }

    async fn replace(
        &self,
        stale: &VariantAssignment,
        assignment: VariantAssignment,
    ) -> Result<VariantAssignment, DomainError> {
        let mut assignments = self
            .assignments
            .write()
            .map_err(|e| DomainError::internal(format!("Failed to acquire write lock: {}", e)))?;

        let stored = assignments.entry(Self::key(&assignment)).or_insert_with(|| stale.clone());
        if stored == stale {
            *stored = assignment;
        }

        Ok(stored.clone())
    }

    async fn count(&self, experiment_id: &str) -> Result<usize, DomainError> {
        let assignments = self
            .assignments
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))?;

        Ok(assignments
            .keys()
            .filter(|(experiment, _)| experiment == experiment_id)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_writer_wins() {
        let repo = InMemoryAssignmentRepository::new();

        let first = repo
            .insert_if_absent(VariantAssignment::new("exp", "user", "control", "openai"))
            .await
            .unwrap();
        let second = repo
            .insert_if_absent(VariantAssignment::new("exp", "user", "treatment", "anthropic"))
            .await
            .unwrap();

        assert_eq!(first.variant_id, "control");
        assert_eq!(second.variant_id, "control");
        assert_eq!(repo.count("exp").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find() {
        let repo = InMemoryAssignmentRepository::new();
        assert!(repo.find("exp", "user").await.unwrap().is_none());

        repo.insert_if_absent(VariantAssignment::new("exp", "user", "control", "openai"))
            .await
            .unwrap();

        let found = repo.find("exp", "user").await.unwrap().unwrap();
        assert_eq!(found.provider, "openai");
        assert!(repo.find("other", "user").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_only_when_unchanged() {
        let repo = InMemoryAssignmentRepository::new();
        let stale = repo
            .insert_if_absent(VariantAssignment::new("exp", "user", "retired", "openai"))
            .await
            .unwrap();

        let replaced = repo
            .replace(&stale, VariantAssignment::new("exp", "user", "control", "openai"))
            .await
            .unwrap();
        assert_eq!(replaced.variant_id, "control");

        // A second racer holding the old value sees the winner
        let loser = repo
            .replace(&stale, VariantAssignment::new("exp", "user", "treatment", "anthropic"))
            .await
            .unwrap();
        assert_eq!(loser.variant_id, "control");
    }

    #[tokio::test]
    async fn test_count_is_per_experiment() {
        let repo = InMemoryAssignmentRepository::new();

        for user in ["a", "b", "c"] {
            repo.insert_if_absent(VariantAssignment::new("exp-1", user, "control", "openai"))
                .await
                .unwrap();
        }
        repo.insert_if_absent(VariantAssignment::new("exp-2", "a", "control", "openai"))
            .await
            .unwrap();

        assert_eq!(repo.count("exp-1").await.unwrap(), 3);
        assert_eq!(repo.count("exp-2").await.unwrap(), 1);
    }
}
