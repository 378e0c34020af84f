use crate::signed_token;
use chrono::Utc;
use gateway_store::{SessionData, SessionStore};
use std::sync::Arc;
use tracing::{debug, info};

/// Validates opaque tokens (session store lookup) or signed tokens (HMAC
/// verification), depending on configuration. Revocation is checked for
/// both token kinds since a signed token's claims can outlive a session
/// the server has since revoked.
pub struct TokenValidator {
    session_store: Arc<SessionStore>,
    signing_secret: Option<String>,
}

impl TokenValidator {
    pub fn new(session_store: Arc<SessionStore>, signing_secret: Option<String>) -> Self {
        Self {
            session_store,
            signing_secret,
        }
    }

    pub fn uses_signed_tokens(&self) -> bool {
        self.signing_secret.is_some()
    }

    pub async fn validate(&self, token: &str) -> Option<SessionData> {
        if self.uses_signed_tokens() {
            self.validate_signed(token).await
        } else {
            self.validate_opaque(token).await
        }
    }

    async fn validate_opaque(&self, token: &str) -> Option<SessionData> {
        let session_id = token;
        let session = self.session_store.get(session_id).await.ok().flatten()?;

        if session.revoked || self.session_store.is_revoked(session_id).await.ok()? {
            info!(session_id, "session is revoked");
            return None;
        }
        if session.is_expired() {
            info!(session_id, "session is expired");
            let _ = self.session_store.delete(session_id).await;
            return None;
        }
        Some(session)
    }

    async fn validate_signed(&self, token: &str) -> Option<SessionData> {
        let secret = self.signing_secret.as_deref()?;
        let payload = signed_token::verify(secret, token)?;

        let now = Utc::now();
        if now >= payload.exp {
            debug!("signed token expired");
            return None;
        }
        if let Some(nbf) = payload.nbf {
            if now < nbf {
                debug!("signed token not yet valid");
                return None;
            }
        }
        if !payload.session_id.is_empty()
            && self
                .session_store
                .is_revoked(&payload.session_id)
                .await
                .ok()?
        {
            info!(session_id = %payload.session_id, "signed token session is revoked");
            return None;
        }

        Some(SessionData {
            session_id: payload.session_id,
            user_id: payload.user_id,
            username: payload.username,
            created_at: payload.iat,
            last_accessed_at: now,
            expires_at: payload.exp,
            revoked: false,
            roles: payload.roles,
            permissions: payload.permissions,
            ip_address: payload.ip_address,
            device_fingerprint: payload.device_fingerprint,
            metadata: payload.metadata,
        })
    }
}
