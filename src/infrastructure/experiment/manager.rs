//! A/B test manager
//!
//! Assigns users to experiment variants and runs completions through the
//! orchestrator pinned to the variant's provider, recording one result per
//! execution.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::ConsistentHasher;
use crate::domain::experiment::{
    summarize_results, AssignmentRepository, ExperimentDefinition, ExperimentResult,
    ExperimentResultRepository, ExperimentSummary, VariantAssignment,
};
use crate::domain::{estimate_tokens, DomainError, UnifiedRequest, UnifiedResponse};
use crate::infrastructure::observability::record_experiment_result;
use crate::infrastructure::orchestrator::{Route, ServiceManager};

/// What [`AbTestManager::execute_with_ab_test`] produced
#[derive(Debug, Clone, Serialize)]
pub struct AbTestOutcome {
    pub response: UnifiedResponse,
    /// `None` when the experiment is unknown or inactive and default routing
    /// served the request
    pub assignment: Option<VariantAssignment>,
    pub result: Option<ExperimentResult>,
}

/// Sticky variant assignment and comparative execution.
///
/// Definitions are read from the orchestrator's routing snapshot on every
/// call, so a configuration reload reaches assignment and execution together.
#[derive(Debug)]
pub struct AbTestManager<A: AssignmentRepository, R: ExperimentResultRepository> {
    orchestrator: Arc<ServiceManager>,
    assignments: Arc<A>,
    results: Arc<R>,
}

impl<A: AssignmentRepository, R: ExperimentResultRepository> AbTestManager<A, R> {
    pub fn new(orchestrator: Arc<ServiceManager>, assignments: Arc<A>, results: Arc<R>) -> Self {
        Self {
            orchestrator,
            assignments,
            results,
        }
    }

    // ========================================================================
    // Definitions
    // ========================================================================

    /// Replace every definition at once; existing assignments are kept
    pub async fn reload_experiments(
        &self,
        experiments: Vec<ExperimentDefinition>,
    ) -> Result<(), DomainError> {
        self.orchestrator.replace_experiments(experiments).await
    }

    /// Definitions ordered by id
    pub async fn list_experiments(&self) -> Vec<ExperimentDefinition> {
        let mut experiments = self.orchestrator.configured_experiments().await;
        experiments.sort_by(|a, b| a.id.cmp(&b.id));
        experiments
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    /// Sticky assignment of `user_id` to a variant of `experiment_id`.
    ///
    /// `None` when the experiment is unknown, inactive or has no weighted
    /// variant. A stored assignment is returned unchanged while its variant
    /// stays active; otherwise the user is rehashed over the active variants.
    #[instrument(skip(self))]
    pub async fn get_variant_for_user(
        &self,
        experiment_id: &str,
        user_id: &str,
        organization_id: Option<&str>,
    ) -> Result<Option<VariantAssignment>, DomainError> {
        let Some(definition) = self.orchestrator.experiment(experiment_id).await else {
            debug!("Unknown experiment");
            return Ok(None);
        };

        Ok(self.assign(&definition, user_id, organization_id).await)
    }

    /// The hash is deterministic, so a failing assignment store costs
    /// stickiness across reassignments only, never the assignment itself
    async fn assign(
        &self,
        definition: &ExperimentDefinition,
        user_id: &str,
        organization_id: Option<&str>,
    ) -> Option<VariantAssignment> {
        let experiment_id = definition.id.as_str();

        if !definition.is_assignable() {
            debug!(experiment_id, "Experiment not assignable");
            return None;
        }

        let existing = match self.assignments.find(experiment_id, user_id).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(experiment_id, user_id, error = %e, "Assignment lookup failed, hashing");
                None
            }
        };
        if let Some(assignment) = &existing {
            if definition.active_variant(&assignment.variant_id).is_some() {
                return existing;
            }
        }

        let variant = ConsistentHasher::bucket(experiment_id, user_id, definition.total_weight())
            .and_then(|bucket| definition.variant_for_bucket(bucket))?;

        let assignment = VariantAssignment::new(experiment_id, user_id, &variant.id, &variant.provider)
            .with_organization(organization_id.map(str::to_string));

        let stored = match &existing {
            Some(stale) => {
                debug!(from = %stale.variant_id, to = %variant.id, "Reassigning from retired variant");
                self.assignments.replace(stale, assignment.clone()).await
            }
            None => self.assignments.insert_if_absent(assignment.clone()).await,
        };

        match stored {
            Ok(stored) => Some(stored),
            Err(e) => {
                warn!(experiment_id, user_id, error = %e, "Failed to store assignment");
                Some(assignment)
            }
        }
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Run `request` under the user's variant and record the outcome.
    ///
    /// Orchestrator errors are recorded as failed results and then returned.
    /// Failing to record or to store the assignment never affects the caller.
    #[instrument(skip(self, request))]
    pub async fn execute_with_ab_test(
        &self,
        experiment_id: &str,
        user_id: &str,
        organization_id: Option<&str>,
        request: &UnifiedRequest,
    ) -> Result<AbTestOutcome, DomainError> {
        let definition = self.orchestrator.experiment(experiment_id).await;
        let assigned = match &definition {
            Some(definition) => self
                .assign(definition, user_id, organization_id)
                .await
                .map(|assignment| (definition, assignment)),
            None => None,
        };

        let Some((definition, assignment)) = assigned else {
            let response = self
                .orchestrator
                .execute_completion(request, &Route::Ranked)
                .await?;

            return Ok(AbTestOutcome {
                response,
                assignment: None,
                result: None,
            });
        };

        // The current definition decides the binding, not the stored provider
        let provider = definition
            .active_variant(&assignment.variant_id)
            .map(|v| v.provider.clone())
            .unwrap_or_else(|| assignment.provider.clone());

        let started = Instant::now();
        let outcome = self
            .orchestrator
            .execute_completion(request, &Route::Pinned(provider))
            .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(response) => {
                let result = self.success_result(&assignment, request, &response, latency_ms).await;
                self.record(result.clone()).await;

                Ok(AbTestOutcome {
                    response,
                    assignment: Some(assignment),
                    result: Some(result),
                })
            }
            Err(e) => {
                self.record(ExperimentResult::failure(&assignment, latency_ms, e.to_string()))
                    .await;
                Err(e)
            }
        }
    }

    async fn success_result(
        &self,
        assignment: &VariantAssignment,
        request: &UnifiedRequest,
        response: &UnifiedResponse,
        latency_ms: u64,
    ) -> ExperimentResult {
        let (prompt_tokens, completion_tokens) = if response.usage.is_empty() {
            (
                estimate_tokens(&request.input_text()),
                estimate_tokens(&response.text),
            )
        } else {
            (response.usage.prompt_tokens, response.usage.completion_tokens)
        };

        let cost_micros = self
            .orchestrator
            .provider_profile(&response.provider)
            .await
            .map(|profile| profile.pricing.cost(&response.model, prompt_tokens, completion_tokens))
            .unwrap_or(0);

        ExperimentResult::success(
            assignment,
            response.provider.clone(),
            latency_ms,
            prompt_tokens + completion_tokens,
            cost_micros,
        )
    }

    async fn record(&self, result: ExperimentResult) {
        record_experiment_result(&result.experiment_id, &result.variant_id, result.success);

        let experiment_id = result.experiment_id.clone();
        if let Err(e) = self.results.record(result).await {
            warn!(experiment_id = %experiment_id, error = %e, "Failed to record experiment result");
        }
    }

    // ========================================================================
    // Analysis
    // ========================================================================

    /// Per-variant aggregates, `None` for an unknown experiment
    pub async fn summarize(
        &self,
        experiment_id: &str,
    ) -> Result<Option<ExperimentSummary>, DomainError> {
        let Some(definition) = self.orchestrator.experiment(experiment_id).await else {
            return Ok(None);
        };

        let results = self.results.list(experiment_id).await?;
        Ok(Some(summarize_results(&definition, &results)))
    }
}
