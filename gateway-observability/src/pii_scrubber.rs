//! PII scrubbing utilities for access logs: header masking and IP
//! pseudonymization, driven by `logging.redact_headers`.
//!
//! ```
//! use gateway_observability::pii_scrubber::{scrub_header, anonymize_ip};
//!
//! let (val, scrubbed) = scrub_header("Authorization", "Bearer eyJ...", &[]);
//! assert_eq!(val, "[REDACTED]");
//! assert!(scrubbed);
//!
//! assert_eq!(anonymize_ip("192.168.1.42"), "192.168.1.0");
//! ```

use std::net::IpAddr;

/// Replacement string used for all masked values.
pub const REDACTED: &str = "[REDACTED]";

/// Headers that are always masked, regardless of `redact_headers` config.
pub const ALWAYS_SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
    "x-access-token",
    "proxy-authorization",
];

/// Masks a single header value if the header name is considered sensitive.
/// Returns `(masked_value, was_scrubbed)`.
pub fn scrub_header(name: &str, value: &str, extra: &[String]) -> (String, bool) {
    let lower = name.to_lowercase();
    let is_sensitive = ALWAYS_SENSITIVE_HEADERS.contains(&lower.as_str())
        || extra.iter().any(|e| e.to_lowercase() == lower);

    if is_sensitive {
        (REDACTED.to_string(), true)
    } else {
        (value.to_string(), false)
    }
}

/// Scrubs all headers in a mutable map. Returns the number masked.
pub fn scrub_headers_map(
    headers: &mut std::collections::HashMap<String, String>,
    extra: &[String],
) -> usize {
    let mut count = 0usize;
    for (key, value) in headers.iter_mut() {
        let (new_val, scrubbed) = scrub_header(key, value, extra);
        if scrubbed {
            *value = new_val;
            count += 1;
        }
    }
    count
}

/// Pseudonymizes an IP address by zeroing its host-specific bits:
/// IPv4 `a.b.c.d` -> `a.b.c.0`, IPv6 zeroes the last 64 bits.
/// Returns the original string unchanged when it cannot be parsed.
pub fn anonymize_ip(ip: &str) -> String {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            let [a, b, c, _] = v4.octets();
            format!("{a}.{b}.{c}.0")
        }
        Ok(IpAddr::V6(v6)) => {
            let mut segs = v6.segments();
            segs[4] = 0;
            segs[5] = 0;
            segs[6] = 0;
            segs[7] = 0;
            std::net::Ipv6Addr::from(segs).to_string()
        }
        Err(_) => ip.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn authorization_header_is_always_masked() {
        let (val, scrubbed) = scrub_header("Authorization", "Bearer token123", &[]);
        assert_eq!(val, REDACTED);
        assert!(scrubbed);
    }

    #[test]
    fn authorization_header_case_insensitive() {
        let (val, _) = scrub_header("AUTHORIZATION", "Bearer token123", &[]);
        assert_eq!(val, REDACTED);
    }

    #[test]
    fn content_type_is_not_masked() {
        let (val, scrubbed) = scrub_header("content-type", "application/json", &[]);
        assert_eq!(val, "application/json");
        assert!(!scrubbed);
    }

    #[test]
    fn extra_sensitive_header_is_masked() {
        let extra = vec!["x-internal-token".to_string()];
        let (val, scrubbed) = scrub_header("X-Internal-Token", "tok-00123", &extra);
        assert_eq!(val, REDACTED);
        assert!(scrubbed);
    }

    #[test]
    fn scrub_headers_map_masks_sensitive_and_preserves_safe() {
        let mut headers = HashMap::new();
        headers.insert("authorization".to_string(), "Bearer secret".to_string());
        headers.insert("content-type".to_string(), "application/json".to_string());
        let count = scrub_headers_map(&mut headers, &[]);
        assert_eq!(count, 1);
        assert_eq!(headers["authorization"], REDACTED);
        assert_eq!(headers["content-type"], "application/json");
    }

    #[test]
    fn ipv4_last_octet_zeroed() {
        assert_eq!(anonymize_ip("192.168.1.42"), "192.168.1.0");
    }

    #[test]
    fn ipv6_last_64_bits_zeroed() {
        let anon = anonymize_ip("2001:db8::1");
        let parsed: std::net::Ipv6Addr = anon.parse().unwrap();
        assert_eq!(&parsed.segments()[4..], &[0, 0, 0, 0]);
    }

    #[test]
    fn unparseable_ip_passes_through() {
        assert_eq!(anonymize_ip("not-an-ip"), "not-an-ip");
    }
}
