//! Shared completion cache backed by Redis

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::domain::cache::Cache;
use crate::domain::DomainError;

pub const DEFAULT_KEY_PREFIX: &str = "llm-orchestrator";

#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Namespace for every key; `clear` and `size` only touch this namespace
    pub key_prefix: String,
}

impl RedisCacheConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

/// Redis cache; clones share one multiplexed connection
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("key_prefix", &self.config.key_prefix)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCache {
    pub async fn new(config: RedisCacheConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::cache(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { connection, config })
    }

    fn prefix_key(&self, key: &str) -> String {
        format!("{}:{}", self.config.key_prefix, key)
    }

    /// All keys in this cache's namespace, walked with SCAN
    async fn namespace_keys(&self) -> Result<Vec<String>, DomainError> {
        let pattern = self.prefix_key("*");
        let mut conn = self.connection.clone();
        let mut cursor = 0u64;
        let mut found = Vec::new();

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(500)
                .query_async(&mut conn)
                .await
                .map_err(|e| DomainError::cache(format!("Failed to scan keys: {}", e)))?;

            found.extend(keys);
            cursor = next;

            if cursor == 0 {
                return Ok(found);
            }
        }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        let mut conn = self.connection.clone();

        conn.get(self.prefix_key(key))
            .await
            .map_err(|e| DomainError::cache(format!("Failed to get key '{}': {}", key, e)))
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();
        // SET EX rejects zero
        let ttl_secs = ttl.as_secs().max(1);

        conn.set_ex::<_, _, ()>(self.prefix_key(key), value, ttl_secs)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to set key '{}': {}", key, e)))
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let mut conn = self.connection.clone();

        let deleted: i64 = conn
            .del(self.prefix_key(key))
            .await
            .map_err(|e| DomainError::cache(format!("Failed to delete key '{}': {}", key, e)))?;

        Ok(deleted > 0)
    }

    async fn clear(&self) -> Result<(), DomainError> {
        let keys = self.namespace_keys().await?;
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection.clone();
        conn.del::<_, ()>(keys)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to clear cache: {}", e)))
    }

    async fn size(&self) -> Result<usize, DomainError> {
        Ok(self.namespace_keys().await?.len())
    }
}
