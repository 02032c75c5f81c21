//! Embedding request and response models

mod request;
mod response;

pub use request::{EmbeddingInput, EmbeddingRequest};
pub use response::{Embedding, EmbeddingResponse, EmbeddingUsage};
