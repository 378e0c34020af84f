use crate::config::RouteConfig;
use std::time::Duration;

/// An immutable route loaded from configuration.
///
/// Routes never change after the router is built from them; there is no
/// hot-reload path (see the crate-level Non-goals note).
#[derive(Debug, Clone)]
pub struct Route {
    pub id: String,
    pub path_pattern: String,
    pub methods: Vec<String>,
    pub upstream_url: String,
    pub auth_required: bool,
    pub auth_roles: Vec<String>,
    pub timeout: Duration,
}

impl Route {
    pub fn method_allowed(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

impl From<&RouteConfig> for Route {
    fn from(cfg: &RouteConfig) -> Self {
        Self {
            id: cfg.id.clone(),
            path_pattern: cfg.path_pattern.clone(),
            methods: cfg.methods.iter().map(|m| m.to_uppercase()).collect(),
            upstream_url: cfg.upstream_url.clone(),
            auth_required: cfg.auth_required,
            auth_roles: cfg.auth_roles.clone(),
            timeout: Duration::from_secs(cfg.timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> Route {
        Route {
            id: "r1".into(),
            path_pattern: "/u/{id}".into(),
            methods: vec!["GET".into(), "POST".into()],
            upstream_url: "http://127.0.0.1:9000".into(),
            auth_required: true,
            auth_roles: vec![],
            timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn method_allowed_is_case_insensitive() {
        let r = route();
        assert!(r.method_allowed("get"));
        assert!(r.method_allowed("GET"));
        assert!(!r.method_allowed("DELETE"));
    }
}
