//! Token and cost estimation

mod cost;
mod pricing;
mod tokens;

pub use cost::{estimate_request_cost, CostEstimate};
pub use pricing::{default_model_pricing, ModelPricing, PricingTable};
pub use tokens::{estimate_tokens, TOKENS_PER_WORD};
