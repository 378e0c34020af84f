use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

/// Unified error type for the gateway's request-processing pipeline.
///
/// Each variant maps to exactly one machine-readable error token and HTTP
/// status code (see [`GatewayError::token`] / [`GatewayError::status_code`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("no route matched")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed { allowed: Vec<String> },

    #[error("session token is invalid or expired")]
    InvalidToken,

    #[error("access denied")]
    Forbidden,

    #[error("rate limit exceeded")]
    RateLimitExceeded { retry_after: u64 },

    #[error("upstream timed out")]
    GatewayTimeout,

    #[error("upstream unreachable")]
    BadGateway,

    #[error("internal error")]
    Internal(String),

    #[error("validation error: {0}")]
    Validation(String),
}

impl GatewayError {
    pub fn token(&self) -> &'static str {
        match self {
            GatewayError::NotFound => "not_found",
            GatewayError::MethodNotAllowed { .. } => "method_not_allowed",
            GatewayError::InvalidToken => "invalid_token",
            GatewayError::Forbidden => "forbidden",
            GatewayError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            GatewayError::GatewayTimeout => "gateway_timeout",
            GatewayError::BadGateway => "bad_gateway",
            GatewayError::Internal(_) => "internal_error",
            GatewayError::Validation(_) => "validation_error",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::NotFound => 404,
            GatewayError::MethodNotAllowed { .. } => 405,
            GatewayError::InvalidToken => 401,
            GatewayError::Forbidden => 403,
            GatewayError::RateLimitExceeded { .. } => 429,
            GatewayError::GatewayTimeout => 504,
            GatewayError::BadGateway => 502,
            GatewayError::Internal(_) => 500,
            GatewayError::Validation(_) => 400,
        }
    }

    /// Build the JSON error envelope (`error`, `message`, `correlation_id`, `timestamp`).
    pub fn envelope(&self, correlation_id: &str) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.token(),
            message: self.to_string(),
            correlation_id: correlation_id.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: &'static str,
    pub message: String,
    pub correlation_id: String,
    pub timestamp: String,
}
