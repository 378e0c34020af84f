use gateway_store::{BucketState, RateLimitStore, StoreError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitState {
    pub allowed: bool,
    pub remaining: u64,
    pub limit: u64,
    pub reset_at: i64,
    pub retry_after: Option<u64>,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Allows bursts up to `burst` (or `limit` if unset) while enforcing a
/// sustained `limit` requests per `window` seconds, refilling
/// continuously rather than only at window boundaries.
pub async fn token_bucket(
    store: &RateLimitStore,
    key: &str,
    limit: u64,
    window: u64,
    burst: Option<u64>,
) -> Result<RateLimitState, StoreError> {
    let capacity = burst.unwrap_or(limit) as f64;
    let refill_rate = limit as f64 / window as f64;
    let now = now_secs();

    let existing = store.get_bucket(key).await?;

    let (tokens, last_refill) = match existing {
        None => (capacity - 1.0, now),
        Some(BucketState { tokens, last_refill }) => {
            let elapsed = now - last_refill;
            let refilled = (tokens + elapsed * refill_rate).min(capacity);
            if refilled >= 1.0 {
                (refilled - 1.0, now)
            } else {
                let retry_after = ((1.0 - refilled) / refill_rate).ceil() as u64 + 1;
                let reset_at = (now + window as f64) as i64;
                return Ok(RateLimitState {
                    allowed: false,
                    remaining: 0,
                    limit,
                    reset_at,
                    retry_after: Some(retry_after),
                });
            }
        }
    };

    store
        .set_bucket(
            key,
            BucketState { tokens, last_refill },
            Duration::from_secs(window * 2),
        )
        .await?;

    Ok(RateLimitState {
        allowed: true,
        remaining: tokens as u64,
        limit,
        reset_at: (now + window as f64) as i64,
        retry_after: None,
    })
}

/// Time is sliced into fixed `window`-second buckets keyed by their
/// start timestamp; simple, but can admit up to `2 * limit` requests
/// spanning a boundary.
pub async fn fixed_window(
    store: &RateLimitStore,
    key: &str,
    limit: u64,
    window: u64,
) -> Result<RateLimitState, StoreError> {
    let now = now_secs();
    let window_start = (now / window as f64).floor() as i64 * window as i64;
    let ttl = Duration::from_secs(window * 2);

    let count = store.get_window_count(key, window_start).await?;
    if count >= limit {
        let reset_at = window_start + window as i64;
        let retry_after = (reset_at as f64 - now).max(0.0) as u64;
        return Ok(RateLimitState {
            allowed: false,
            remaining: 0,
            limit,
            reset_at,
            retry_after: Some(retry_after),
        });
    }

    let new_count = store.incr_window_count(key, window_start, ttl).await?;
    Ok(RateLimitState {
        allowed: true,
        remaining: limit.saturating_sub(new_count),
        limit,
        reset_at: window_start + window as i64,
        retry_after: None,
    })
}

/// Weights the previous window's count by how far the current window has
/// progressed, smoothing the boundary-burst problem fixed windows have
/// without fixed window's memory cost.
pub async fn sliding_window(
    store: &RateLimitStore,
    key: &str,
    limit: u64,
    window: u64,
) -> Result<RateLimitState, StoreError> {
    let now = now_secs();
    let current_window_start = (now / window as f64).floor() as i64 * window as i64;
    let previous_window_start = current_window_start - window as i64;
    let ttl = Duration::from_secs(window * 2);

    let current_count = store.get_window_count(key, current_window_start).await?;
    let previous_count = store.get_window_count(key, previous_window_start).await?;

    let time_in_window = now - current_window_start as f64;
    let progress = (time_in_window / window as f64).clamp(0.0, 1.0);

    let weighted = previous_count as f64 * (1.0 - progress) + current_count as f64;
    if weighted >= limit as f64 {
        let reset_at = current_window_start + window as i64;
        let retry_after = (reset_at as f64 - now).max(0.0) as u64;
        return Ok(RateLimitState {
            allowed: false,
            remaining: 0,
            limit,
            reset_at,
            retry_after: Some(retry_after),
        });
    }

    let new_current_count = store
        .incr_window_count(key, current_window_start, ttl)
        .await?;
    let weighted_after = previous_count as f64 * (1.0 - progress) + new_current_count as f64;
    let remaining = (limit as f64 - weighted_after).max(0.0) as u64;

    Ok(RateLimitState {
        allowed: true,
        remaining,
        limit,
        reset_at: current_window_start + window as i64,
        retry_after: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_store::InMemoryStateStore;
    use std::sync::Arc;

    fn store() -> RateLimitStore {
        RateLimitStore::new(Arc::new(InMemoryStateStore::new()))
    }

    #[tokio::test]
    async fn token_bucket_consumes_one_token_per_call_until_empty() {
        let store = store();
        for _ in 0..5 {
            let state = token_bucket(&store, "k", 5, 10, None).await.unwrap();
            assert!(state.allowed);
        }
        let denied = token_bucket(&store, "k", 5, 10, None).await.unwrap();
        assert!(!denied.allowed);
        assert!(denied.retry_after.is_some());
    }

    #[tokio::test]
    async fn fixed_window_denies_once_limit_reached() {
        let store = store();
        for _ in 0..3 {
            let state = fixed_window(&store, "k", 3, 60).await.unwrap();
            assert!(state.allowed);
        }
        let denied = fixed_window(&store, "k", 3, 60).await.unwrap();
        assert!(!denied.allowed);
    }

    #[tokio::test]
    async fn sliding_window_allows_within_limit() {
        let store = store();
        let state = sliding_window(&store, "k", 10, 60).await.unwrap();
        assert!(state.allowed);
        assert_eq!(state.remaining, 9);
    }
}
