//! Response cache backends

mod factory;
mod in_memory;
mod redis;

pub use factory::{create_cache, CacheConfig, CacheType};
pub use in_memory::{InMemoryCache, InMemoryCacheConfig};
pub use self::redis::{RedisCache, RedisCacheConfig};
