use crate::pii_scrubber;
use serde::{Deserialize, Serialize};

/// Structured access log entry, emitted once per request by the
/// response-log stage.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub timestamp: String,
    pub correlation_id: String,
    pub route_id: Option<String>,
    pub client_ip: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub latency_ms: f64,
    pub user_id: Option<String>,
}

impl AccessLogEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        correlation_id: impl Into<String>,
        route_id: Option<String>,
        client_ip: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
        status: u16,
        latency_ms: f64,
        user_id: Option<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            correlation_id: correlation_id.into(),
            route_id,
            client_ip: client_ip.into(),
            method: method.into(),
            path: path.into(),
            status,
            latency_ms,
            user_id,
        }
    }

    /// Pseudonymizes the client IP in place, per `logging.redact_headers`-style
    /// operator opt-in (the access log has no headers of its own to redact,
    /// but the IP is the equivalent PII field here).
    pub fn anonymize_ip(&mut self) {
        self.client_ip = pii_scrubber::anonymize_ip(&self.client_ip);
    }

    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymize_ip_zeroes_last_octet() {
        let mut entry = AccessLogEntry::new("req-1", Some("r1".into()), "10.0.0.42", "GET", "/x", 200, 1.5, None);
        entry.anonymize_ip();
        assert_eq!(entry.client_ip, "10.0.0.0");
    }

    #[test]
    fn to_json_line_produces_valid_json() {
        let entry = AccessLogEntry::new("req-1", None, "10.0.0.1", "GET", "/x", 404, 0.2, None);
        let line = entry.to_json_line();
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["status"], 404);
    }
}
