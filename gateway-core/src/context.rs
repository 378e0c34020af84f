use crate::router::RouteMatch;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

/// Identity populated by the authenticator. Absent fields mean "not
/// authenticated yet".
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub authenticated: bool,
}

/// Rate-limit decision surfaced to response shaping. `limit` of `0` means
/// no rule has run yet.
#[derive(Debug, Clone, Default)]
pub struct RateLimitInfo {
    pub key: String,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: i64,
    pub retry_after: Option<u64>,
}

/// Created once per request, mutated only by the stage that owns each
/// field, never shared across requests.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub query: String,
    pub client_ip: String,
    pub user_agent: Option<String>,
    pub correlation_id: String,
    pub start: Instant,

    pub route_match: Option<RouteMatch>,
    pub identity: Identity,
    pub rate_limit: Option<RateLimitInfo>,
    pub attributes: HashMap<String, Value>,
}

impl RequestContext {
    pub fn new(
        method: String,
        path: String,
        query: String,
        client_ip: String,
        user_agent: Option<String>,
        correlation_id: String,
    ) -> Self {
        Self {
            method,
            path,
            query,
            client_ip,
            user_agent,
            correlation_id,
            start: Instant::now(),
            route_match: None,
            identity: Identity::default(),
            rate_limit: None,
            attributes: HashMap::new(),
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }
}

/// `req-` followed by 16 lowercase hex characters, per the correlation-id
/// contract: verbatim if the client supplied the configured header,
/// otherwise freshly generated here.
pub fn generate_correlation_id() -> String {
    let bytes: [u8; 8] = rand::rng().random();
    let mut id = String::with_capacity(20);
    id.push_str("req-");
    for b in bytes {
        id.push_str(&format!("{b:02x}"));
    }
    id
}

/// First token of `X-Forwarded-For` (trimmed) if present, else the peer address.
pub fn resolve_client_ip(forwarded_for: Option<&str>, peer_addr: &str) -> String {
    if let Some(xff) = forwarded_for {
        if let Some(first) = xff.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    peer_addr.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_id_has_expected_shape() {
        let id = generate_correlation_id();
        assert!(id.starts_with("req-"));
        assert_eq!(id.len(), 4 + 16);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn client_ip_prefers_first_xff_token_trimmed() {
        assert_eq!(
            resolve_client_ip(Some(" 10.0.0.1 , 10.0.0.2"), "192.168.1.1"),
            "10.0.0.1"
        );
    }

    #[test]
    fn client_ip_falls_back_to_peer_addr() {
        assert_eq!(resolve_client_ip(None, "192.168.1.1"), "192.168.1.1");
        assert_eq!(resolve_client_ip(Some(""), "192.168.1.1"), "192.168.1.1");
    }
}
