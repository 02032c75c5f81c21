//! Provider-agnostic completion request and response models

mod message;
mod request;
mod response;

pub use message::{Message, MessageRole};
pub use request::{UnifiedRequest, UnifiedRequestBuilder, MAX_TEMPERATURE, MIN_TEMPERATURE};
pub use response::{FinishReason, StreamChunk, UnifiedResponse, Usage};
