use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend returned malformed data for key '{0}'")]
    Corrupt(String),
}

/// Token-bucket state persisted between requests: fractional tokens
/// remaining and the unix-epoch timestamp of the last refill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketState {
    pub tokens: f64,
    pub last_refill: f64,
}

/// A key-value store with per-key TTL, a per-key string set, and the
/// small set of numeric primitives the rate limiter needs. Session data
/// and rate-limit counters are both just structured values layered on
/// top of this; neither backend knows about sessions or rate limits.
///
/// Two backends: an in-process one for a single gateway instance, and a
/// Redis-backed one for a fleet sharing state. Both must be safe to hold
/// behind an `Arc` and call from many tasks concurrently.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn sadd(&self, key: &str, member: &str, ttl: Duration) -> Result<(), StoreError>;
    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Reads token-bucket state for `key`, if any has been persisted.
    async fn get_bucket_state(&self, key: &str) -> Result<Option<BucketState>, StoreError>;
    /// Persists token-bucket state for `key` with the given TTL.
    async fn set_bucket_state(
        &self,
        key: &str,
        state: BucketState,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Atomically increments the counter at `key` by one, creating it
    /// with the given TTL if absent, and returns the post-increment value.
    async fn incr_window(&self, key: &str, ttl: Duration) -> Result<u64, StoreError>;
    /// Reads the current counter at `key` without mutating it.
    async fn get_window(&self, key: &str) -> Result<u64, StoreError>;

    /// Cheap connectivity probe used by the `/health/ready` endpoint.
    async fn is_healthy(&self) -> bool;
}
