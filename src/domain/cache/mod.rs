//! Cache domain - key/value store with TTL used for response caching

mod key;
mod repository;

pub use key::{completion_fingerprint, COMPLETION_NAMESPACE};
pub use repository::{Cache, CacheExt};

#[cfg(test)]
pub use repository::mock::MockCache;
