//! Post-hoc aggregation of experiment results

use std::collections::HashMap;

use serde::Serialize;

use super::{ExperimentDefinition, ExperimentResult};

/// Aggregates for one variant
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VariantSummary {
    pub variant_id: String,
    pub provider: String,
    pub requests: u64,
    pub successes: u64,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub total_tokens: u64,
    pub total_cost_micros: i64,
}

/// Aggregates for an experiment, one entry per declared variant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentSummary {
    pub experiment_id: String,
    pub active: bool,
    pub total_requests: u64,
    pub variants: Vec<VariantSummary>,
}

#[derive(Default)]
struct Totals {
    requests: u64,
    successes: u64,
    latency_ms: u64,
    tokens: u64,
    cost_micros: i64,
}

/// Summarize `results` per variant of `definition`.
///
/// Results for variants no longer declared are ignored.
pub fn summarize_results(
    definition: &ExperimentDefinition,
    results: &[ExperimentResult],
) -> ExperimentSummary {
    let mut totals: HashMap<&str, Totals> = HashMap::new();

    for result in results {
        let entry = totals.entry(result.variant_id.as_str()).or_default();
        entry.requests += 1;
        entry.latency_ms += result.latency_ms;
        if result.success {
            entry.successes += 1;
            entry.tokens += result.tokens_used as u64;
            entry.cost_micros += result.cost_micros;
        }
    }

    let variants: Vec<VariantSummary> = definition
        .variants
        .iter()
        .map(|variant| {
            let t = totals.remove(variant.id.as_str()).unwrap_or_default();
            let ratio = |value: f64| {
                if t.requests == 0 {
                    0.0
                } else {
                    value / t.requests as f64
                }
            };

            VariantSummary {
                variant_id: variant.id.clone(),
                provider: variant.provider.clone(),
                requests: t.requests,
                successes: t.successes,
                success_rate: ratio(t.successes as f64),
                avg_latency_ms: ratio(t.latency_ms as f64),
                total_tokens: t.tokens,
                total_cost_micros: t.cost_micros,
            }
        })
        .collect();

    ExperimentSummary {
        experiment_id: definition.id.clone(),
        active: definition.active,
        total_requests: variants.iter().map(|v| v.requests).sum(),
        variants,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::{Variant, VariantAssignment};

    #[test]
    fn test_summarize_per_variant() {
        let definition = ExperimentDefinition::new(
            "exp",
            vec![Variant::new("a", 50, "p1"), Variant::new("b", 50, "p2")],
        );
        let on_a = VariantAssignment::new("exp", "u1", "a", "p1");
        let on_b = VariantAssignment::new("exp", "u2", "b", "p2");
        let removed = VariantAssignment::new("exp", "u3", "gone", "p3");

        let results = vec![
            ExperimentResult::success(&on_a, "p1", 100, 10, 1_000),
            ExperimentResult::failure(&on_a, 300, "boom"),
            ExperimentResult::success(&on_b, "p2", 50, 20, 4_000),
            ExperimentResult::success(&removed, "p3", 10, 5, 5),
        ];

        let summary = summarize_results(&definition, &results);

        assert_eq!(summary.total_requests, 3);
        let a = &summary.variants[0];
        assert_eq!(a.requests, 2);
        assert_eq!(a.successes, 1);
        assert!((a.success_rate - 0.5).abs() < f64::EPSILON);
        assert!((a.avg_latency_ms - 200.0).abs() < f64::EPSILON);
        assert_eq!(a.total_tokens, 10);

        let b = &summary.variants[1];
        assert_eq!(b.total_cost_micros, 4_000);
        assert!((b.success_rate - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summarize_without_results() {
        let definition = ExperimentDefinition::new("exp", vec![Variant::new("a", 1, "p1")]);

        let summary = summarize_results(&definition, &[]);

        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.variants[0].success_rate, 0.0);
    }
}
