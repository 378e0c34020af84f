pub mod authorizer;
pub mod extractor;
pub mod refresher;
pub mod signed_token;
pub mod validator;

pub use authorizer::Authorizer;
pub use extractor::TokenExtractor;
pub use refresher::TokenRefresher;
pub use validator::TokenValidator;

use gateway_core::context::Identity;
use gateway_store::SessionStore;
use std::sync::Arc;

/// Outcome of running a request through the authentication/authorization
/// pipeline. Maps directly onto the middleware's response shaping: every
/// variant but `Authorized` and `NotRequired` short-circuits with a
/// specific status and error token.
#[derive(Debug)]
pub enum AuthDecision {
    /// The matched route doesn't require authentication.
    NotRequired,
    /// Auth is required but no token was present on the request.
    MissingToken,
    /// A token was present but failed validation (unknown, expired, revoked, bad signature).
    InvalidToken,
    /// The session is valid but lacks any of the route's required roles.
    Forbidden { identity: Identity },
    /// The session is valid and authorized. `new_token` is set when refresh ran.
    Authorized {
        identity: Identity,
        new_token: Option<String>,
    },
}

fn identity_from_session(session: &gateway_store::SessionData) -> Identity {
    Identity {
        user_id: Some(session.user_id.clone()),
        session_id: Some(session.session_id.clone()),
        roles: session.roles.clone(),
        permissions: session.permissions.clone(),
        authenticated: true,
    }
}

/// Wires together extraction, validation, authorization, and refresh.
/// One instance is built at startup from [`gateway_core::config::SessionConfig`]
/// and shared across every request.
pub struct Authenticator {
    extractor: TokenExtractor,
    validator: TokenValidator,
    refresher: Option<TokenRefresher>,
}

impl Authenticator {
    pub fn new(
        session_store: Arc<SessionStore>,
        cookie_name: impl Into<String>,
        signing_secret: Option<String>,
        refresh_enabled: bool,
        refresh_threshold_secs: u64,
        token_ttl_secs: u64,
    ) -> Self {
        let refresher = refresh_enabled.then(|| {
            TokenRefresher::new(
                session_store.clone(),
                refresh_threshold_secs,
                token_ttl_secs,
                signing_secret.clone(),
            )
        });

        Self {
            extractor: TokenExtractor::new(cookie_name),
            validator: TokenValidator::new(session_store, signing_secret),
            refresher,
        }
    }

    pub async fn authenticate(
        &self,
        auth_required: bool,
        required_roles: &[String],
        cookie_header: Option<&str>,
        authorization_header: Option<&str>,
    ) -> AuthDecision {
        if !auth_required {
            return AuthDecision::NotRequired;
        }

        let Some(token) = self.extractor.extract(cookie_header, authorization_header) else {
            return AuthDecision::MissingToken;
        };

        let Some(session) = self.validator.validate(&token).await else {
            return AuthDecision::InvalidToken;
        };

        let identity = identity_from_session(&session);
        if !Authorizer::authorize(&session.roles, required_roles) {
            return AuthDecision::Forbidden { identity };
        }

        let new_token = match &self.refresher {
            Some(refresher) => refresher.refresh(session).await.1,
            None => None,
        };

        AuthDecision::Authorized { identity, new_token }
    }
}
