/// Pulls a session token out of a request's cookie jar or Authorization
/// header. Cookie wins; the header is a fallback for non-browser clients.
pub struct TokenExtractor {
    cookie_name: String,
}

impl TokenExtractor {
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
        }
    }

    pub fn extract_from_cookie_header(&self, cookie_header: Option<&str>) -> Option<String> {
        let header = cookie_header?;
        for part in header.split(';') {
            let part = part.trim();
            let Some((name, value)) = part.split_once('=') else {
                continue;
            };
            if name.trim() == self.cookie_name {
                return Some(value.trim().to_string());
            }
        }
        None
    }

    pub fn extract_from_auth_header(&self, authorization: Option<&str>) -> Option<String> {
        let header = authorization?;
        header.strip_prefix("Bearer ").map(|t| t.trim().to_string())
    }

    pub fn extract(&self, cookie_header: Option<&str>, authorization: Option<&str>) -> Option<String> {
        self.extract_from_cookie_header(cookie_header)
            .or_else(|| self.extract_from_auth_header(authorization))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_cookie_over_header() {
        let extractor = TokenExtractor::new("session_token");
        let token = extractor.extract(
            Some("session_token=abc123; other=x"),
            Some("Bearer headertoken"),
        );
        assert_eq!(token, Some("abc123".to_string()));
    }

    #[test]
    fn falls_back_to_bearer_header() {
        let extractor = TokenExtractor::new("session_token");
        let token = extractor.extract(None, Some("Bearer headertoken"));
        assert_eq!(token, Some("headertoken".to_string()));
    }

    #[test]
    fn missing_token_is_none() {
        let extractor = TokenExtractor::new("session_token");
        assert_eq!(extractor.extract(None, None), None);
        assert_eq!(extractor.extract(Some("foo=bar"), None), None);
    }

    #[test]
    fn malformed_crumb_is_skipped_not_fatal() {
        let extractor = TokenExtractor::new("session_token");
        let token = extractor.extract(Some("; ; session_token=abc123"), None);
        assert_eq!(token, Some("abc123".to_string()));
    }
}
