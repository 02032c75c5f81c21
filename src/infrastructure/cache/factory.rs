//! Cache backend selection

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::cache::Cache;
use crate::domain::DomainError;

use super::in_memory::{InMemoryCache, InMemoryCacheConfig};
use super::redis::{RedisCache, RedisCacheConfig, DEFAULT_KEY_PREFIX};

/// Supported cache backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    #[default]
    InMemory,
    Redis,
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheType::InMemory => write!(f, "in_memory"),
            CacheType::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for CacheType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(CacheType::InMemory),
            "redis" => Ok(CacheType::Redis),
            _ => Err(DomainError::configuration(format!(
                "Unknown cache type: {}. Valid types: in_memory, redis",
                s
            ))),
        }
    }
}

/// Backend settings for [`create_cache`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(rename = "type")]
    pub cache_type: CacheType,
    /// Required for the Redis backend
    pub redis_url: Option<String>,
    pub key_prefix: Option<String>,
    /// In-memory capacity, entries
    pub max_capacity: Option<u64>,
}

impl CacheConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            cache_type: CacheType::Redis,
            redis_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }
}

/// Build the configured cache backend
pub async fn create_cache(config: &CacheConfig) -> Result<Arc<dyn Cache>, DomainError> {
    match config.cache_type {
        CacheType::InMemory => {
            let mut in_memory = InMemoryCacheConfig::default();
            if let Some(capacity) = config.max_capacity {
                in_memory = in_memory.with_max_capacity(capacity);
            }

            info!(backend = %config.cache_type, "Response cache initialized");
            Ok(Arc::new(InMemoryCache::with_config(in_memory)))
        }
        CacheType::Redis => {
            let url = config.redis_url.clone().ok_or_else(|| {
                DomainError::configuration("Redis URL is required for Redis cache type")
            })?;

            let prefix = config.key_prefix.as_deref().unwrap_or(DEFAULT_KEY_PREFIX);
            let cache = RedisCache::new(RedisCacheConfig::new(url).with_key_prefix(prefix)).await?;

            info!(backend = %config.cache_type, prefix, "Response cache initialized");
            Ok(Arc::new(cache))
        }
    }
}
