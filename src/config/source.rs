use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;

use super::AppConfig;
use crate::domain::DomainError;

/// Where the orchestrator reads its configuration from, on startup and on reload
#[async_trait]
pub trait ConfigurationSource: Send + Sync + Debug {
    async fn load(&self) -> Result<AppConfig, DomainError>;
}

/// Layered files plus `APP__*` environment variables
#[derive(Debug, Default, Clone)]
pub struct FileConfigurationSource {
    path: Option<PathBuf>,
}

impl FileConfigurationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer an explicit file over the defaults
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

#[async_trait]
impl ConfigurationSource for FileConfigurationSource {
    async fn load(&self) -> Result<AppConfig, DomainError> {
        let loaded = match &self.path {
            Some(path) => AppConfig::load_from(path),
            None => AppConfig::load(),
        };

        loaded.map_err(|e| DomainError::configuration(format!("Failed to load configuration: {}", e)))
    }
}

/// In-memory configuration that can be swapped at runtime
#[derive(Debug, Default)]
pub struct StaticConfigurationSource {
    config: RwLock<AppConfig>,
}

impl StaticConfigurationSource {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Replace the configuration returned by subsequent loads
    pub fn replace(&self, config: AppConfig) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
    }
}

#[async_trait]
impl ConfigurationSource for StaticConfigurationSource {
    async fn load(&self) -> Result<AppConfig, DomainError> {
        Ok(self.config.read().unwrap_or_else(|e| e.into_inner()).clone())
    }
}
