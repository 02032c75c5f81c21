//! Process-local completion cache backed by moka

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::domain::cache::Cache;
use crate::domain::DomainError;

/// Sizing for [`InMemoryCache`]
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    pub max_capacity: u64,
    /// Upper bound on any entry's lifetime, regardless of the TTL it was stored with
    pub max_ttl: Duration,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            max_ttl: Duration::from_secs(24 * 3600),
        }
    }
}

impl InMemoryCacheConfig {
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = ttl;
        self
    }
}

#[derive(Debug, Clone)]
struct Entry {
    data: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Thread-safe in-memory cache with a per-entry TTL.
///
/// moka evicts by capacity and by the global `max_ttl`; the per-entry deadline
/// is checked on read.
#[derive(Debug)]
pub struct InMemoryCache {
    entries: MokaCache<String, Entry>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let entries = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.max_ttl)
            .build();

        Self { entries }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        match self.entries.get(key).await {
            Some(entry) if entry.is_live() => Ok(Some(entry.data)),
            Some(_) => {
                self.entries.remove(key).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let entry = Entry {
            data: value.to_string(),
            expires_at: Instant::now() + ttl,
        };

        self.entries.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self
            .entries
            .remove(key)
            .await
            .is_some_and(|entry| entry.is_live()))
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
        Ok(())
    }

    async fn size(&self) -> Result<usize, DomainError> {
        self.entries.run_pending_tasks().await;
        Ok(self.entries.entry_count() as usize)
    }
}
