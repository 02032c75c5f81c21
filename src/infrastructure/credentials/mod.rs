//! Credential provider implementations

mod env_provider;
mod static_provider;

pub use env_provider::EnvCredentialProvider;
pub use static_provider::{ChainedCredentialProvider, StaticCredentialProvider};
