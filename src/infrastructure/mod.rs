//! Infrastructure layer - External service implementations

pub mod cache;
pub mod credentials;
pub mod experiment;
pub mod llm;
pub mod observability;
pub mod orchestrator;
