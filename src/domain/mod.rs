//! Domain layer - provider-agnostic models, contracts and state machines

pub mod cache;
pub mod credentials;
pub mod embedding;
pub mod error;
pub mod estimator;
pub mod experiment;
pub mod llm;
pub mod metrics;
pub mod provider;
pub mod resilience;

pub use cache::{completion_fingerprint, Cache, CacheExt};
pub use credentials::{Credential, CredentialProvider};
pub use embedding::{Embedding, EmbeddingInput, EmbeddingRequest, EmbeddingResponse, EmbeddingUsage};
pub use error::{DomainError, ProviderFailure};
pub use estimator::{estimate_tokens, CostEstimate, ModelPricing, PricingTable};
pub use experiment::{
    AssignmentRepository, ExperimentDefinition, ExperimentResult, ExperimentResultRepository,
    ExperimentSummary, Variant, VariantAssignment, VariantSummary,
};
pub use llm::{
    FinishReason, Message, MessageRole, StreamChunk, UnifiedRequest, UnifiedRequestBuilder,
    UnifiedResponse, Usage,
};
pub use self::metrics::{HealthCheckRecord, ProviderMetrics, ProviderMetricsSnapshot};
pub use provider::{
    Capability, CapabilitySet, ChunkStream, ProviderAdapter, ProviderKind, ProviderProfile,
};
pub use resilience::{
    CallPermit, CircuitBreaker, CircuitBreakerSettings, CircuitBreakerSnapshot, CircuitStatus,
};
