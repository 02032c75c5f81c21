//! Embedding request types

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Input for embedding generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    /// Single text input
    Single(String),
    /// Batch of text inputs
    Batch(Vec<String>),
}

impl EmbeddingInput {
    /// Get all inputs as a vector
    pub fn as_vec(&self) -> Vec<&str> {
        match self {
            EmbeddingInput::Single(s) => vec![s.as_str()],
            EmbeddingInput::Batch(v) => v.iter().map(|s| s.as_str()).collect(),
        }
    }

    /// Get the number of inputs
    pub fn len(&self) -> usize {
        match self {
            EmbeddingInput::Single(_) => 1,
            EmbeddingInput::Batch(v) => v.len(),
        }
    }

    /// Check if there is nothing to embed
    pub fn is_empty(&self) -> bool {
        match self {
            EmbeddingInput::Single(s) => s.trim().is_empty(),
            EmbeddingInput::Batch(v) => v.iter().all(|s| s.trim().is_empty()),
        }
    }
}

/// Provider-agnostic request to generate embeddings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Input text(s) to embed
    input: EmbeddingInput,
    /// Model hint, resolved per provider
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    /// Optional dimensions (for models that support it)
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

impl EmbeddingRequest {
    /// Create a new embedding request
    pub fn new(input: EmbeddingInput) -> Self {
        Self {
            input,
            model: None,
            dimensions: None,
        }
    }

    /// Create a request for a single text
    pub fn single(text: impl Into<String>) -> Self {
        Self::new(EmbeddingInput::Single(text.into()))
    }

    /// Create a request for multiple texts
    pub fn batch(texts: Vec<String>) -> Self {
        Self::new(EmbeddingInput::Batch(texts))
    }

    /// Set the model hint
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the output dimensions
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn input(&self) -> &EmbeddingInput {
        &self.input
    }

    pub fn inputs(&self) -> Vec<&str> {
        self.input.as_vec()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.input.is_empty() {
            return Err(DomainError::invalid_request("embedding input cannot be empty"));
        }

        if self.dimensions == Some(0) {
            return Err(DomainError::invalid_request("dimensions must be greater than 0"));
        }

        Ok(())
    }
}
