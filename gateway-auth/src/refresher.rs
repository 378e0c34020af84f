use crate::signed_token::{self, SignedTokenPayload};
use chrono::{Duration as ChronoDuration, Utc};
use gateway_store::{SessionData, SessionStore};
use std::sync::Arc;
use tracing::{error, info};

/// Extends a session's lifetime and mints a fresh token once its
/// remaining lifetime drops below `refresh_threshold`. Opaque-token
/// deployments just keep handing back the (unchanged) session id; signed
/// deployments must issue a new signature since the expiry is baked into
/// the claims.
pub struct TokenRefresher {
    session_store: Arc<SessionStore>,
    refresh_threshold: ChronoDuration,
    token_ttl: ChronoDuration,
    signing_secret: Option<String>,
}

impl TokenRefresher {
    pub fn new(
        session_store: Arc<SessionStore>,
        refresh_threshold_secs: u64,
        token_ttl_secs: u64,
        signing_secret: Option<String>,
    ) -> Self {
        Self {
            session_store,
            refresh_threshold: ChronoDuration::seconds(refresh_threshold_secs as i64),
            token_ttl: ChronoDuration::seconds(token_ttl_secs as i64),
            signing_secret,
        }
    }

    pub fn should_refresh(&self, session: &SessionData) -> bool {
        (session.expires_at - Utc::now()) < self.refresh_threshold
    }

    /// Returns the (possibly updated) session and a new token when a
    /// refresh happened, or `None` when the session didn't need one.
    pub async fn refresh(&self, mut session: SessionData) -> (SessionData, Option<String>) {
        if !self.should_refresh(&session) {
            return (session, None);
        }

        session.expires_at = Utc::now() + self.token_ttl;
        session.last_accessed_at = Utc::now();

        if let Err(e) = self.session_store.update(&session).await {
            error!(error = %e, session_id = %session.session_id, "failed to persist refreshed session");
            return (session, None);
        }

        let new_token = match &self.signing_secret {
            None => Some(session.session_id.clone()),
            Some(secret) => {
                let payload = SignedTokenPayload {
                    session_id: session.session_id.clone(),
                    user_id: session.user_id.clone(),
                    username: session.username.clone(),
                    iat: session.created_at,
                    exp: session.expires_at,
                    nbf: None,
                    roles: session.roles.clone(),
                    permissions: session.permissions.clone(),
                    ip_address: session.ip_address.clone(),
                    device_fingerprint: session.device_fingerprint.clone(),
                    metadata: session.metadata.clone(),
                };
                signed_token::generate(secret, &payload).ok()
            }
        };

        info!(session_id = %session.session_id, "refreshed session");
        (session, new_token)
    }
}
