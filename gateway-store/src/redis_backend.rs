use crate::state_store::{BucketState, StateStore, StoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::warn;

/// Fleet-wide backend. Holds a single [`ConnectionManager`], which
/// reconnects and pipelines internally, so cloning this struct is cheap
/// and safe to share across every request task.
#[derive(Clone)]
pub struct RedisStateStore {
    conn: ConnectionManager,
}

impl RedisStateStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self { conn })
    }

    fn bucket_tokens_field() -> &'static str {
        "tokens"
    }

    fn bucket_refill_field() -> &'static str {
        "last_refill"
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .del(key)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        conn.exists(key)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn sadd(&self, key: &str, member: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .sadd(key, member)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        conn.expire::<_, ()>(key, ttl.as_secs().max(1) as i64)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(key, member)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.smembers(key)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn get_bucket_state(&self, key: &str) -> Result<Option<BucketState>, StoreError> {
        let mut conn = self.conn.clone();
        let fields: Vec<Option<String>> = conn
            .hget(key, (Self::bucket_tokens_field(), Self::bucket_refill_field()))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let (Some(tokens), Some(refill)) = (fields.first().cloned().flatten(), fields.get(1).cloned().flatten()) else {
            return Ok(None);
        };
        let tokens: f64 = tokens.parse().map_err(|_| StoreError::Corrupt(key.to_string()))?;
        let last_refill: f64 = refill.parse().map_err(|_| StoreError::Corrupt(key.to_string()))?;
        Ok(Some(BucketState { tokens, last_refill }))
    }

    async fn set_bucket_state(
        &self,
        key: &str,
        state: BucketState,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.hset(key, Self::bucket_tokens_field(), state.tokens)
            .ignore()
            .hset(key, Self::bucket_refill_field(), state.last_refill)
            .ignore()
            .expire(key, ttl.as_secs().max(1) as i64)
            .ignore();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn incr_window(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let count: u64 = conn
            .incr(key, 1u64)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if count == 1 {
            if let Err(e) = conn
                .expire::<_, ()>(key, ttl.as_secs().max(1) as i64)
                .await
            {
                warn!(error = %e, key, "failed to set expiry on fresh rate-limit window");
            }
        }
        Ok(count)
    }

    async fn get_window(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let count: Option<u64> = conn
            .get(key)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(count.unwrap_or(0))
    }

    async fn is_healthy(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}
