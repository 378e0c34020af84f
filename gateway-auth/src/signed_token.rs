use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Claims carried by a signed token. Not a standard JWT: the wire format
/// is `<base64(payload_json)>.<hex(hmac_sha256(secret, payload_b64))>`,
/// with no header segment and no algorithm negotiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTokenPayload {
    pub session_id: String,
    pub user_id: String,
    pub username: String,
    pub iat: DateTime<Utc>,
    pub exp: DateTime<Utc>,
    pub nbf: Option<DateTime<Utc>>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub ip_address: Option<String>,
    pub device_fingerprint: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Signs `payload` with `secret`, returning `<payload_b64>.<hex signature>`.
pub fn generate(secret: &str, payload: &SignedTokenPayload) -> Result<String, serde_json::Error> {
    let payload_json = serde_json::to_vec(payload)?;
    let payload_b64 = BASE64.encode(payload_json);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts a key of any length");
    mac.update(payload_b64.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(format!("{payload_b64}.{signature}"))
}

/// Verifies the signature and decodes the payload, rejecting tokens that
/// don't parse, don't have exactly two `.`-separated parts, or whose
/// signature doesn't match. The expiry and not-before checks are the
/// caller's responsibility since only it knows "now".
pub fn verify(secret: &str, token: &str) -> Option<SignedTokenPayload> {
    let (payload_b64, signature_hex) = token.split_once('.')?;
    if payload_b64.contains('.') || signature_hex.contains('.') {
        return None;
    }

    let signature = hex::decode(signature_hex).ok()?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload_b64.as_bytes());
    if mac.verify_slice(&signature).is_err() {
        warn!("signed token signature verification failed");
        return None;
    }

    let payload_json = BASE64.decode(payload_b64).ok()?;
    serde_json::from_slice(&payload_json).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn payload() -> SignedTokenPayload {
        let now = Utc::now();
        SignedTokenPayload {
            session_id: "sess-1".to_string(),
            user_id: "user-1".to_string(),
            username: "alice".to_string(),
            iat: now,
            exp: now + Duration::seconds(3600),
            nbf: None,
            roles: vec!["admin".to_string()],
            permissions: vec![],
            ip_address: None,
            device_fingerprint: None,
            metadata: Default::default(),
        }
    }

    #[test]
    fn generate_then_verify_roundtrips() {
        let token = generate("s3cret", &payload()).unwrap();
        let verified = verify("s3cret", &token).unwrap();
        assert_eq!(verified.session_id, "sess-1");
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let token = generate("s3cret", &payload()).unwrap();
        assert!(verify("wrong-secret", &token).is_none());
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let token = generate("s3cret", &payload()).unwrap();
        let (payload_b64, sig) = token.split_once('.').unwrap();
        let tampered = format!("{payload_b64}x.{sig}");
        assert!(verify("s3cret", &tampered).is_none());
    }

    #[test]
    fn malformed_token_fails_verification() {
        assert!(verify("s3cret", "not-a-valid-token").is_none());
        assert!(verify("s3cret", "a.b.c").is_none());
    }
}
