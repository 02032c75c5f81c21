//! Configuration module

mod app_config;
mod source;

pub use app_config::{
    AppConfig, CircuitBreakerConfig, CredentialsConfig, LogFormat, LoggingConfig,
    OrchestratorConfig, PriceConfig, ProviderConfig,
};
pub use source::{ConfigurationSource, FileConfigurationSource, StaticConfigurationSource};
