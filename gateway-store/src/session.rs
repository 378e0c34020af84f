use crate::state_store::{StateStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const KEY_PREFIX: &str = "session:";

fn session_key(session_id: &str) -> String {
    format!("{KEY_PREFIX}{session_id}")
}

fn revocation_key(session_id: &str) -> String {
    format!("{KEY_PREFIX}revoked:{session_id}")
}

fn user_sessions_key(user_id: &str) -> String {
    format!("{KEY_PREFIX}user:{user_id}:sessions")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub session_id: String,
    pub user_id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub ip_address: Option<String>,
    pub device_fingerprint: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl SessionData {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        !self.is_expired() && !self.revoked
    }

    fn ttl(&self) -> Option<Duration> {
        let remaining = (self.expires_at - Utc::now()).num_seconds();
        if remaining <= 0 {
            None
        } else {
            Some(Duration::from_secs(remaining as u64))
        }
    }
}

/// Session CRUD, revocation, and the per-user index, layered on a
/// generic [`StateStore`] so the same logic runs against either backend.
pub struct SessionStore {
    backend: Arc<dyn StateStore>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn StateStore>) -> Self {
        Self { backend }
    }

    pub async fn create(&self, session: &SessionData) -> Result<bool, StoreError> {
        let Some(ttl) = session.ttl() else {
            warn!(session_id = %session.session_id, "refusing to create already-expired session");
            return Ok(false);
        };

        let payload = serde_json::to_string(session).map_err(|_| {
            StoreError::Corrupt(session.session_id.clone())
        })?;
        self.backend
            .set(&session_key(&session.session_id), &payload, ttl)
            .await?;
        self.backend
            .sadd(&user_sessions_key(&session.user_id), &session.session_id, ttl)
            .await?;
        debug!(session_id = %session.session_id, user_id = %session.user_id, "created session");
        Ok(true)
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<SessionData>, StoreError> {
        let Some(raw) = self.backend.get(&session_key(session_id)).await? else {
            return Ok(None);
        };
        let session: SessionData =
            serde_json::from_str(&raw).map_err(|_| StoreError::Corrupt(session_id.to_string()))?;
        if session.is_expired() {
            self.delete(session_id).await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    pub async fn update(&self, session: &SessionData) -> Result<bool, StoreError> {
        if !self.backend.exists(&session_key(&session.session_id)).await? {
            return Ok(false);
        }
        let Some(ttl) = session.ttl() else {
            self.delete(&session.session_id).await?;
            return Ok(false);
        };
        let payload = serde_json::to_string(session)
            .map_err(|_| StoreError::Corrupt(session.session_id.clone()))?;
        self.backend
            .set(&session_key(&session.session_id), &payload, ttl)
            .await?;
        Ok(true)
    }

    pub async fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        let existing = self.get_raw(session_id).await?;
        let deleted = self.backend.delete(&session_key(session_id)).await?;
        if let Some(session) = existing {
            self.backend
                .srem(&user_sessions_key(&session.user_id), session_id)
                .await?;
        }
        self.backend.delete(&revocation_key(session_id)).await?;
        Ok(deleted)
    }

    /// Like [`get`](Self::get) but does not recurse into delete-on-expiry,
    /// used internally so `delete` can find the owning user without looping.
    async fn get_raw(&self, session_id: &str) -> Result<Option<SessionData>, StoreError> {
        let Some(raw) = self.backend.get(&session_key(session_id)).await? else {
            return Ok(None);
        };
        Ok(serde_json::from_str(&raw).ok())
    }

    pub async fn revoke(&self, session_id: &str) -> Result<bool, StoreError> {
        let Some(mut session) = self.get(session_id).await? else {
            return Ok(false);
        };
        session.revoked = true;
        let ttl = session.ttl();
        self.update(&session).await?;
        if let Some(ttl) = ttl {
            self.backend
                .set(&revocation_key(session_id), "1", ttl)
                .await?;
        }
        Ok(true)
    }

    pub async fn revoke_all_user_sessions(&self, user_id: &str) -> Result<u64, StoreError> {
        let session_ids = self.backend.smembers(&user_sessions_key(user_id)).await?;
        let mut count = 0;
        for session_id in session_ids {
            if self.revoke(&session_id).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    pub async fn is_revoked(&self, session_id: &str) -> Result<bool, StoreError> {
        self.backend.exists(&revocation_key(session_id)).await
    }

    pub async fn is_healthy(&self) -> bool {
        self.backend.is_healthy().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStateStore;
    use chrono::Duration as ChronoDuration;

    fn sample(session_id: &str, user_id: &str) -> SessionData {
        let now = Utc::now();
        SessionData {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            username: "alice".to_string(),
            created_at: now,
            last_accessed_at: now,
            expires_at: now + ChronoDuration::seconds(60),
            revoked: false,
            roles: vec!["admin".to_string()],
            permissions: vec![],
            ip_address: None,
            device_fingerprint: None,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let store = SessionStore::new(Arc::new(InMemoryStateStore::new()));
        let session = sample("s1", "u1");
        assert!(store.create(&session).await.unwrap());
        let fetched = store.get("s1").await.unwrap().unwrap();
        assert_eq!(fetched.user_id, "u1");
    }

    #[tokio::test]
    async fn revoke_marks_session_invalid_and_tracked() {
        let store = SessionStore::new(Arc::new(InMemoryStateStore::new()));
        let session = sample("s1", "u1");
        store.create(&session).await.unwrap();
        assert!(store.revoke("s1").await.unwrap());
        assert!(store.is_revoked("s1").await.unwrap());
        let fetched = store.get("s1").await.unwrap().unwrap();
        assert!(!fetched.is_valid());
    }

    #[tokio::test]
    async fn revoke_all_user_sessions_covers_every_session() {
        let store = SessionStore::new(Arc::new(InMemoryStateStore::new()));
        store.create(&sample("s1", "u1")).await.unwrap();
        store.create(&sample("s2", "u1")).await.unwrap();
        let count = store.revoke_all_user_sessions("u1").await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn delete_removes_session_and_user_index_entry() {
        let store = SessionStore::new(Arc::new(InMemoryStateStore::new()));
        store.create(&sample("s1", "u1")).await.unwrap();
        assert!(store.delete("s1").await.unwrap());
        assert!(store.get("s1").await.unwrap().is_none());
    }
}
