use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Why a single candidate provider did not serve a request
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: String,
    pub reason: String,
}

impl ProviderFailure {
    pub fn new(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.reason)
    }
}

fn join_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Provider timeout: {provider} did not respond within {timeout_ms}ms")]
    ProviderTimeout { provider: String, timeout_ms: u64 },

    #[error("Provider error: {provider} - {message}")]
    ProviderTransport { provider: String, message: String },

    #[error("Circuit open: provider '{provider}' is not accepting requests")]
    CircuitOpen { provider: String },

    #[error("All providers exhausted: {}", join_failures(.failures))]
    AllProvidersExhausted { failures: Vec<ProviderFailure> },

    #[error("Unknown provider: {name}")]
    UnknownProvider { name: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Credential error: {message}")]
    Credential { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn provider_timeout(provider: impl Into<String>, timeout_ms: u64) -> Self {
        Self::ProviderTimeout {
            provider: provider.into(),
            timeout_ms,
        }
    }

    pub fn provider_transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderTransport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn circuit_open(provider: impl Into<String>) -> Self {
        Self::CircuitOpen {
            provider: provider.into(),
        }
    }

    pub fn exhausted(failures: Vec<ProviderFailure>) -> Self {
        Self::AllProvidersExhausted { failures }
    }

    pub fn unknown_provider(name: impl Into<String>) -> Self {
        Self::UnknownProvider { name: name.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the orchestrator may fall back to another provider after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ProviderTimeout { .. } | Self::ProviderTransport { .. } | Self::CircuitOpen { .. }
        )
    }

    /// Short machine-readable label, used as a metrics dimension
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::ProviderTimeout { .. } => "timeout",
            Self::ProviderTransport { .. } => "transport",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::AllProvidersExhausted { .. } => "exhausted",
            Self::UnknownProvider { .. } => "unknown_provider",
            Self::Configuration { .. } => "configuration",
            Self::Credential { .. } => "credential",
            Self::Cache { .. } => "cache",
            Self::Storage { .. } => "storage",
            Self::Internal { .. } => "internal",
        }
    }

    /// Per-provider causes carried by an exhausted dispatch
    pub fn failures(&self) -> &[ProviderFailure] {
        match self {
            Self::AllProvidersExhausted { failures } => failures,
            _ => &[],
        }
    }
}
