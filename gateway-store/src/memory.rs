use crate::state_store::{BucketState, StateStore, StoreError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Entry<T> {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Default)]
struct Inner {
    strings: HashMap<String, Entry<String>>,
    sets: HashMap<String, Entry<HashSet<String>>>,
    buckets: HashMap<String, Entry<BucketState>>,
    windows: HashMap<String, Entry<u64>>,
}

/// Single process, single gateway instance. A lone `Mutex` guards every
/// map: the rate limiter's read-then-write sequences (read tokens,
/// compute, write tokens back) must be indivisible, and two separate
/// locks (one per map) would let a concurrent request interleave between
/// them and corrupt the bucket. Expired entries are reaped lazily on
/// access rather than by a background sweep.
pub struct InMemoryStateStore {
    inner: Mutex<Inner>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.strings.get(key) {
            Some(e) if !e.is_expired() => Ok(Some(e.value.clone())),
            Some(_) => {
                inner.strings.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.strings.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.strings.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.strings.get(key) {
            Some(e) if !e.is_expired() => Ok(true),
            Some(_) => {
                inner.strings.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn sadd(&self, key: &str, member: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let expired = matches!(inner.sets.get(key), Some(e) if e.is_expired());
        if expired {
            inner.sets.remove(key);
        }
        let entry = inner.sets.entry(key.to_string()).or_insert_with(|| Entry {
            value: HashSet::new(),
            expires_at: Instant::now() + ttl,
        });
        entry.value.insert(member.to_string());
        entry.expires_at = Instant::now() + ttl;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.sets.get_mut(key) {
            entry.value.remove(member);
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.sets.get(key) {
            Some(e) if !e.is_expired() => Ok(e.value.iter().cloned().collect()),
            Some(_) => {
                inner.sets.remove(key);
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }

    async fn get_bucket_state(&self, key: &str) -> Result<Option<BucketState>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.buckets.get(key) {
            Some(e) if !e.is_expired() => Ok(Some(e.value)),
            Some(_) => {
                inner.buckets.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_bucket_state(
        &self,
        key: &str,
        state: BucketState,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.buckets.insert(
            key.to_string(),
            Entry {
                value: state,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn incr_window(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let expired = matches!(inner.windows.get(key), Some(e) if e.is_expired());
        if expired {
            inner.windows.remove(key);
        }
        let entry = inner.windows.entry(key.to_string()).or_insert_with(|| Entry {
            value: 0,
            expires_at: Instant::now() + ttl,
        });
        entry.value += 1;
        Ok(entry.value)
    }

    async fn get_window(&self, key: &str) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.windows.get(key) {
            Some(e) if !e.is_expired() => Ok(e.value),
            Some(_) => {
                inner.windows.remove(key);
                Ok(0)
            }
            None => Ok(0),
        }
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let store = InMemoryStateStore::new();
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent() {
        let store = InMemoryStateStore::new();
        store
            .set("k", "v", Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_membership_add_remove() {
        let store = InMemoryStateStore::new();
        store.sadd("s", "a", Duration::from_secs(60)).await.unwrap();
        store.sadd("s", "b", Duration::from_secs(60)).await.unwrap();
        let mut members = store.smembers("s").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);

        store.srem("s", "a").await.unwrap();
        assert_eq!(store.smembers("s").await.unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn window_increment_accumulates_until_expiry() {
        let store = InMemoryStateStore::new();
        assert_eq!(store.incr_window("w", Duration::from_secs(60)).await.unwrap(), 1);
        assert_eq!(store.incr_window("w", Duration::from_secs(60)).await.unwrap(), 2);
        assert_eq!(store.get_window("w").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn bucket_state_roundtrips() {
        let store = InMemoryStateStore::new();
        let state = BucketState {
            tokens: 4.5,
            last_refill: 1000.0,
        };
        store
            .set_bucket_state("b", state, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get_bucket_state("b").await.unwrap(), Some(state));
    }
}
