use gateway_store::{InMemoryStateStore, RedisStateStore, StateStore};
use std::sync::Arc;

/// Builds a [`StateStore`] backend from a `store_url`: `memory://` selects
/// the in-process store, anything else is handed to the Redis client as a
/// connection URL.
pub async fn build_state_store(store_url: &str) -> anyhow::Result<Arc<dyn StateStore>> {
    if store_url.starts_with("memory://") {
        Ok(Arc::new(InMemoryStateStore::new()))
    } else {
        let store = RedisStateStore::connect(store_url).await?;
        Ok(Arc::new(store))
    }
}
