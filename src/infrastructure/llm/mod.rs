//! Provider adapters over HTTP

mod anthropic;
mod factory;
mod http_client;
mod openai;
mod sse;

pub use anthropic::{AnthropicAdapter, DEFAULT_ANTHROPIC_BASE_URL};
pub use factory::{AdapterFactory, HttpAdapterFactory};
pub use http_client::{ByteStream, HttpClient, HttpClientTrait, HttpError};
pub use openai::{OpenAiAdapter, DEFAULT_OPENAI_BASE_URL};

#[cfg(test)]
pub use factory::mock::MockAdapterFactory;
