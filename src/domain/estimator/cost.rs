use serde::{Deserialize, Serialize};

use super::PricingTable;
use crate::domain::llm::UnifiedRequest;

/// Approximate cost of a request before it is sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub model: String,
    pub prompt_tokens: u32,
    /// Upper bound for the completion, taken from `max_tokens` when set
    pub completion_tokens: u32,
    pub cost_micros: i64,
}

impl CostEstimate {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn cost_usd(&self) -> f64 {
        self.cost_micros as f64 / 1_000_000.0
    }
}

/// Estimate the cost of `request` against `model`.
///
/// Without `max_tokens` the completion is assumed to be as long as the prompt.
pub fn estimate_request_cost(
    request: &UnifiedRequest,
    model: &str,
    pricing: &PricingTable,
    estimate_tokens: impl Fn(&str) -> u32,
) -> CostEstimate {
    let prompt_tokens = estimate_tokens(&request.input_text());
    let completion_tokens = request.max_tokens.unwrap_or(prompt_tokens);

    CostEstimate {
        model: model.to_string(),
        prompt_tokens,
        completion_tokens,
        cost_micros: pricing.cost(model, prompt_tokens, completion_tokens),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::estimator::{estimate_tokens, ModelPricing};

    #[test]
    fn test_estimate_uses_max_tokens() {
        let pricing = PricingTable::new().with_pricing(ModelPricing::new("m", 1.0, 2.0));
        let request = UnifiedRequest::builder()
            .prompt("one two three four five six seven eight nine ten")
            .max_tokens(100)
            .build();

        let estimate = estimate_request_cost(&request, "m", &pricing, estimate_tokens);

        assert_eq!(estimate.prompt_tokens, 13);
        assert_eq!(estimate.completion_tokens, 100);
        assert_eq!(estimate.total_tokens(), 113);
        // 13 * 1000 + 100 * 2000
        assert_eq!(estimate.cost_micros, 13_000 + 200_000);
    }

    #[test]
    fn test_estimate_without_max_tokens_mirrors_prompt() {
        let request = UnifiedRequest::from_prompt("hello world");

        let estimate =
            estimate_request_cost(&request, "unpriced", &PricingTable::new(), estimate_tokens);

        assert_eq!(estimate.prompt_tokens, 3);
        assert_eq!(estimate.completion_tokens, 3);
        assert_eq!(estimate.cost_micros, 0);
    }
}
