//! Model pricing configuration

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Pricing for a single model, in micro-dollars per 1K tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub model_id: String,
    pub input_price_per_1k_micros: i64,
    pub output_price_per_1k_micros: i64,
}

impl ModelPricing {
    /// Create pricing from USD prices per 1K tokens
    pub fn new(model_id: impl Into<String>, input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            model_id: model_id.into(),
            input_price_per_1k_micros: (input_per_1k * 1_000_000.0).round() as i64,
            output_price_per_1k_micros: (output_per_1k * 1_000_000.0).round() as i64,
        }
    }

    pub fn input_price_per_1k(&self) -> f64 {
        self.input_price_per_1k_micros as f64 / 1_000_000.0
    }

    pub fn output_price_per_1k(&self) -> f64 {
        self.output_price_per_1k_micros as f64 / 1_000_000.0
    }

    /// Calculate cost in micro-dollars for given token counts
    pub fn calculate_cost(&self, input_tokens: u32, output_tokens: u32) -> i64 {
        let input_cost = (input_tokens as i64 * self.input_price_per_1k_micros) / 1000;
        let output_cost = (output_tokens as i64 * self.output_price_per_1k_micros) / 1000;

        input_cost + output_cost
    }

    /// Calculate cost in USD
    pub fn calculate_cost_usd(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        self.calculate_cost(input_tokens, output_tokens) as f64 / 1_000_000.0
    }
}

static DEFAULT_PRICING: Lazy<HashMap<String, ModelPricing>> = Lazy::new(|| {
    [
        ModelPricing::new("gpt-4o", 0.005, 0.015),
        ModelPricing::new("gpt-4o-mini", 0.00015, 0.0006),
        ModelPricing::new("gpt-4-turbo", 0.01, 0.03),
        ModelPricing::new("gpt-3.5-turbo", 0.0005, 0.0015),
        ModelPricing::new("claude-3-5-sonnet-20241022", 0.003, 0.015),
        ModelPricing::new("claude-3-5-haiku-20241022", 0.0008, 0.004),
        ModelPricing::new("claude-3-opus-20240229", 0.015, 0.075),
        ModelPricing::new("claude-3-haiku-20240307", 0.00025, 0.00125),
        ModelPricing::new("text-embedding-3-small", 0.00002, 0.0),
        ModelPricing::new("text-embedding-3-large", 0.00013, 0.0),
    ]
    .into_iter()
    .map(|p| (p.model_id.clone(), p))
    .collect()
});

/// Default pricing for common models
pub fn default_model_pricing() -> &'static HashMap<String, ModelPricing> {
    &DEFAULT_PRICING
}

/// Per-provider pricing table.
///
/// Explicit entries win over the built-in defaults; models found in neither
/// are priced at zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingTable {
    entries: HashMap<String, ModelPricing>,
}

impl PricingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.insert(pricing);
        self
    }

    pub fn insert(&mut self, pricing: ModelPricing) {
        self.entries.insert(pricing.model_id.clone(), pricing);
    }

    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.entries
            .get(model)
            .or_else(|| default_model_pricing().get(model))
    }

    /// Cost in micro-dollars, zero for unpriced models
    pub fn cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> i64 {
        self.get(model)
            .map(|p| p.calculate_cost(input_tokens, output_tokens))
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
