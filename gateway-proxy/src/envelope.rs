use crate::chain::GatewayResponse;
use bytes::Bytes;
use gateway_core::GatewayError;
use http::header::{CONTENT_TYPE, WWW_AUTHENTICATE};
use http::HeaderValue;
use serde::Serialize;

#[derive(Serialize)]
struct OverriddenEnvelope<'a> {
    error: &'a str,
    message: &'a str,
    correlation_id: &'a str,
    timestamp: &'a str,
}

/// Renders a [`GatewayError`] as the pipeline's JSON envelope with the
/// matching status code.
pub fn error_response(error: &GatewayError, correlation_id: &str) -> GatewayResponse {
    let envelope = error.envelope(correlation_id);
    let body = serde_json::to_vec(&envelope).unwrap_or_default();

    let mut builder = http::Response::builder()
        .status(error.status_code())
        .header(CONTENT_TYPE, "application/json");

    if let GatewayError::MethodNotAllowed { allowed } = error {
        if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
            builder = builder.header(http::header::ALLOW, value);
        }
    }

    builder.body(Bytes::from(body)).expect("static envelope response is well-formed")
}

/// Like [`error_response`] but adds `WWW-Authenticate: Bearer`, required
/// on every 401 the authenticator stage produces.
pub fn unauthenticated_response(error: &GatewayError, correlation_id: &str) -> GatewayResponse {
    let mut response = error_response(error, correlation_id);
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

/// A 401 for a request that carried no token at all. Same `invalid_token`
/// error code and status as [`unauthenticated_response`] — the client-facing
/// contract doesn't distinguish missing from invalid — but with a message
/// that tells a human what actually happened.
pub fn missing_token_response(correlation_id: &str) -> GatewayResponse {
    let envelope = OverriddenEnvelope {
        error: GatewayError::InvalidToken.token(),
        message: "Authentication required",
        correlation_id,
        timestamp: &chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    };
    let body = serde_json::to_vec(&envelope).unwrap_or_default();

    http::Response::builder()
        .status(401)
        .header(CONTENT_TYPE, "application/json")
        .header(WWW_AUTHENTICATE, "Bearer")
        .body(Bytes::from(body))
        .expect("static envelope response is well-formed")
}
