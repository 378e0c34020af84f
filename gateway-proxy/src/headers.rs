use http::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;

const SKIP_UPSTREAM_REQUEST_HEADERS: &[&str] =
    &["host", "connection", "transfer-encoding", "content-length"];
const SKIP_UPSTREAM_RESPONSE_HEADERS: &[&str] = &["connection", "transfer-encoding", "content-encoding"];

/// Builds the upstream URL by grafting the request path onto the route's
/// base URL: a base URL with a non-root path is treated as a mount point
/// (its path is prefixed to every request), a bare `scheme://host` base
/// is not.
pub fn construct_upstream_url(base_url: &str, request_path: &str, query: &str) -> Option<String> {
    let parsed = Url::parse(base_url).ok()?;
    let base_path = parsed.path();
    let full_path = if !base_path.is_empty() && base_path != "/" {
        format!("{}{}", base_path.trim_end_matches('/'), request_path)
    } else {
        request_path.to_string()
    };

    let mut url = format!("{}://{}", parsed.scheme(), parsed.host_str()?);
    if let Some(port) = parsed.port() {
        url.push_str(&format!(":{port}"));
    }
    url.push_str(&full_path);
    if !query.is_empty() {
        url.push('?');
        url.push_str(query);
    }
    Some(url)
}

/// Copies request headers to forward upstream, dropping the ones the
/// HTTP client manages itself, then stamps on the proxy's own headers.
pub fn prepare_upstream_headers(
    request_headers: &HeaderMap,
    upstream_url: &str,
    correlation_id: &str,
    user_id: Option<&str>,
    client_ip: &str,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in request_headers.iter() {
        if !SKIP_UPSTREAM_REQUEST_HEADERS.contains(&name.as_str()) {
            headers.insert(name.clone(), value.clone());
        }
    }

    let parsed = Url::parse(upstream_url).ok();
    if let Some(parsed) = &parsed {
        if let Some(host) = parsed.host_str() {
            let host_header = match parsed.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
            if let Ok(value) = HeaderValue::from_str(&host_header) {
                headers.insert(http::header::HOST, value);
            }
        }
    }

    let xff_name = HeaderName::from_static("x-forwarded-for");
    let xff = match request_headers.get(&xff_name).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{existing}, {client_ip}"),
        _ => client_ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&xff) {
        headers.insert(xff_name, value);
    }

    let proto_name = HeaderName::from_static("x-forwarded-proto");
    if !headers.contains_key(&proto_name) {
        let scheme = parsed.as_ref().map(|p| p.scheme()).unwrap_or("http");
        if let Ok(value) = HeaderValue::from_str(scheme) {
            headers.insert(proto_name, value);
        }
    }

    if let Ok(value) = HeaderValue::from_str(correlation_id) {
        headers.insert(HeaderName::from_static("x-request-id"), value);
    }

    if let Some(user_id) = user_id {
        if let Ok(value) = HeaderValue::from_str(user_id) {
            headers.insert(HeaderName::from_static("x-user-id"), value);
        }
    }

    headers
}

/// Copies upstream response headers back to the client, dropping the
/// ones the HTTP client already manages, then stamps on the correlation
/// header. Rate-limit headers are added later by the rate-limiter stage,
/// which is the only stage that knows the outcome for every response
/// (allowed or denied), not just proxied ones.
pub fn prepare_response_headers(upstream_headers: &HeaderMap, correlation_id: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream_headers.iter() {
        if !SKIP_UPSTREAM_RESPONSE_HEADERS.contains(&name.as_str()) {
            headers.insert(name.clone(), value.clone());
        }
    }

    if let Ok(value) = HeaderValue::from_str(correlation_id) {
        headers.insert(HeaderName::from_static("x-request-id"), value);
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_point_base_path_is_prefixed() {
        let url = construct_upstream_url("http://backend:8080/api", "/users/1", "").unwrap();
        assert_eq!(url, "http://backend:8080/api/users/1");
    }

    #[test]
    fn bare_base_url_has_no_prefix() {
        let url = construct_upstream_url("http://backend:8080", "/users/1", "page=2").unwrap();
        assert_eq!(url, "http://backend:8080/users/1?page=2");
    }

    #[test]
    fn upstream_headers_drop_hop_by_hop_and_add_forwarding_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::HOST, HeaderValue::from_static("original-host"));
        headers.insert(http::header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("1.1.1.1"),
        );

        let upstream =
            prepare_upstream_headers(&headers, "http://backend:8080", "req-abc", Some("u1"), "2.2.2.2");

        assert!(!upstream.contains_key(http::header::CONNECTION));
        assert_eq!(upstream.get(http::header::HOST).unwrap(), "backend:8080");
        assert_eq!(
            upstream.get(HeaderName::from_static("x-forwarded-for")).unwrap(),
            "1.1.1.1, 2.2.2.2"
        );
        assert_eq!(upstream.get(HeaderName::from_static("x-user-id")).unwrap(), "u1");
    }
}
