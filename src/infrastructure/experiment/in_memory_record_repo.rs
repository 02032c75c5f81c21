//! In-memory implementation of the experiment result repository

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::RwLock;

use crate::domain::experiment::{ExperimentResult, ExperimentResultRepository};
use crate::domain::DomainError;

/// Append-only result log, bounded by dropping the oldest results
#[derive(Debug)]
pub struct InMemoryExperimentResultRepository {
    results: RwLock<VecDeque<ExperimentResult>>,
    max_records: usize,
}

impl InMemoryExperimentResultRepository {
    /// Create a new empty repository with default max records (100,000)
    pub fn new() -> Self {
        Self::with_max_records(100_000)
    }

    pub fn with_max_records(max_records: usize) -> Self {
        Self {
            results: RwLock::new(VecDeque::new()),
            max_records,
        }
    }
}

impl Default for InMemoryExperimentResultRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExperimentResultRepository for InMemoryExperimentResultRepository {
    async fn record(&self, result: ExperimentResult) -> Result<(), DomainError> {
        let mut results = self
            .results
            .write()
            .map_err(|e| DomainError::internal(format!("Failed to acquire write lock: {}", e)))?;

        results.push_back(result);
        while results.len() > self.max_records {
            results.pop_front();
        }

        Ok(())
    }

    async fn list(&self, experiment_id: &str) -> Result<Vec<ExperimentResult>, DomainError> {
        let results = self
            .results
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))?;

        Ok(results
            .iter()
            .filter(|r| r.experiment_id == experiment_id)
            .cloned()
            .collect())
    }
}
