//! Provider adapter trait

use std::fmt::Debug;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tracing::{debug, warn};

use super::{CapabilitySet, ProviderProfile};
use crate::domain::embedding::{EmbeddingRequest, EmbeddingResponse};
use crate::domain::estimator::{self, estimate_request_cost, CostEstimate};
use crate::domain::llm::{StreamChunk, UnifiedRequest, UnifiedResponse};
use crate::domain::DomainError;

/// Stream of completion chunks
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, DomainError>> + Send>>;

/// Normalizes one remote AI backend into the unified request/response shape.
///
/// The model argument is already resolved against the provider's mapping
/// table. Implementations translate every transport failure into
/// [`DomainError`] before returning.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + Debug {
    /// Static description of this provider
    fn profile(&self) -> &ProviderProfile;

    fn name(&self) -> &str {
        &self.profile().name
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.profile().capabilities
    }

    /// Generate a completion
    async fn complete(
        &self,
        model: &str,
        request: &UnifiedRequest,
    ) -> Result<UnifiedResponse, DomainError>;

    /// Generate embeddings
    async fn embed(
        &self,
        model: &str,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingResponse, DomainError> {
        let _ = (model, request);
        Err(DomainError::invalid_request(format!(
            "Provider '{}' does not support embeddings",
            self.name()
        )))
    }

    /// Generate a streaming completion
    async fn stream(
        &self,
        model: &str,
        request: &UnifiedRequest,
    ) -> Result<ChunkStream, DomainError> {
        let _ = (model, request);
        Err(DomainError::invalid_request(format!(
            "Provider '{}' does not support streaming",
            self.name()
        )))
    }

    /// Approximate token count; override with an exact tokenizer when available
    fn estimate_tokens(&self, text: &str) -> u32 {
        estimator::estimate_tokens(text)
    }

    fn estimate_cost(&self, request: &UnifiedRequest) -> CostEstimate {
        let profile = self.profile();
        let model = profile.resolve_model(request.model.as_deref());

        estimate_request_cost(request, &model, &profile.pricing, |text| {
            self.estimate_tokens(text)
        })
    }

    /// Issue a single 1-token completion against the default model.
    ///
    /// Never retried: one failed attempt is a failed check.
    async fn health_check(&self) -> bool {
        let model = self.profile().default_model.clone();

        match self.complete(&model, &UnifiedRequest::health_probe()).await {
            Ok(response) => {
                debug!(provider = %self.name(), model = %response.model, "Health check passed");
                true
            }
            Err(e) => {
                warn!(provider = %self.name(), error = %e, "Health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
pub mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use futures::stream;

    use super::*;
    use crate::domain::embedding::{Embedding, EmbeddingUsage};
    use crate::domain::llm::{FinishReason, Usage};

    /// How a [`MockAdapter`] answers
    #[derive(Debug, Clone, PartialEq)]
    pub enum MockBehavior {
        Succeed,
        /// Fail every call with a transport error
        Fail(String),
        /// Sleep before succeeding
        Delay(Duration),
        /// Reject the request as invalid
        Reject(String),
        /// Streams emit one chunk and then a transport error
        BreakMidStream,
    }

    /// Scriptable in-process provider for tests
    #[derive(Debug)]
    pub struct MockAdapter {
        profile: ProviderProfile,
        behavior: Mutex<MockBehavior>,
        calls: AtomicUsize,
    }

    impl MockAdapter {
        pub fn new(profile: ProviderProfile) -> Self {
            Self {
                profile,
                behavior: Mutex::new(MockBehavior::Succeed),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_behavior(self, behavior: MockBehavior) -> Self {
            self.set_behavior(behavior);
            self
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        /// Number of calls that reached this adapter
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn act(&self) -> Result<(), DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let behavior = self.behavior.lock().unwrap().clone();

            match behavior {
                MockBehavior::Succeed | MockBehavior::BreakMidStream => Ok(()),
                MockBehavior::Fail(reason) => {
                    Err(DomainError::provider_transport(&self.profile.name, reason))
                }
                MockBehavior::Delay(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(())
                }
                MockBehavior::Reject(reason) => Err(DomainError::invalid_request(reason)),
            }
        }
    }

    #[async_trait]
    impl ProviderAdapter for MockAdapter {
        fn profile(&self) -> &ProviderProfile {
            &self.profile
        }

        async fn complete(
            &self,
            model: &str,
            request: &UnifiedRequest,
        ) -> Result<UnifiedResponse, DomainError> {
            self.act().await?;

            let text = format!("response from {}", self.profile.name);
            let usage = Usage::new(self.estimate_tokens(&request.input_text()), 5);

            Ok(UnifiedResponse::new(uuid::Uuid::new_v4().to_string(), model, text)
                .with_usage(usage)
                .with_finish_reason(FinishReason::Stop))
        }

        async fn embed(
            &self,
            model: &str,
            request: &EmbeddingRequest,
        ) -> Result<EmbeddingResponse, DomainError> {
            self.act().await?;

            let data = request
                .inputs()
                .iter()
                .enumerate()
                .map(|(i, _)| Embedding::new(i, vec![0.1, 0.2, 0.3]))
                .collect();

            Ok(EmbeddingResponse::new(model, data, EmbeddingUsage::new(4, 4)))
        }

        async fn stream(
            &self,
            _model: &str,
            _request: &UnifiedRequest,
        ) -> Result<ChunkStream, DomainError> {
            self.act().await?;

            let broken = *self.behavior.lock().unwrap() == MockBehavior::BreakMidStream;
            let chunks: Vec<Result<StreamChunk, DomainError>> = if broken {
                vec![
                    Ok(StreamChunk::delta("Hello")),
                    Err(DomainError::provider_transport(
                        &self.profile.name,
                        "connection reset",
                    )),
                ]
            } else {
                vec![
                    Ok(StreamChunk::delta("Hello")),
                    Ok(StreamChunk::delta(" world")),
                    Ok(StreamChunk::finished(FinishReason::Stop).with_usage(Usage::new(2, 2))),
                ]
            };

            Ok(Box::pin(stream::iter(chunks)))
        }
    }
}
