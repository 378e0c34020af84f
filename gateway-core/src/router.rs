use crate::pathpattern::{PatternError, PathPattern};
use crate::route::Route;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("route '{id}' has invalid pattern: {source}")]
    InvalidPattern { id: String, source: PatternError },
}

/// Produced by a successful match: the route plus captured path parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Route,
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub enum RouterOutcome {
    Matched(RouteMatch),
    /// No pattern matched the path at all.
    NotFound,
    /// One or more patterns matched the path but not the method.
    MethodNotAllowed(Vec<String>),
}

struct Entry {
    route: Route,
    pattern: PathPattern,
}

/// Compiles and holds routes for the lifetime of the process.
///
/// Immutable after construction: there is no hot-reload path, so lookups
/// never need synchronization.
pub struct Router {
    entries: Vec<Entry>,
}

impl Router {
    /// Compiles every route's pattern and pre-sorts by priority
    /// `(-literal_segment_count, -pattern_length)` so matching always
    /// scans most-specific-first.
    pub fn new(routes: Vec<Route>) -> Result<Self, RouterError> {
        let mut entries = Vec::with_capacity(routes.len());
        for route in routes {
            let pattern = PathPattern::compile(&route.path_pattern).map_err(|source| {
                RouterError::InvalidPattern {
                    id: route.id.clone(),
                    source,
                }
            })?;
            entries.push(Entry { route, pattern });
        }

        entries.sort_by_key(|e| {
            (
                std::cmp::Reverse(e.pattern.literal_count()),
                std::cmp::Reverse(e.pattern.len()),
            )
        });

        Ok(Self { entries })
    }

    /// Matches `(path, method)` against the compiled routes in priority order.
    pub fn match_route(&self, path: &str, method: &str) -> RouterOutcome {
        let mut allowed = BTreeSet::new();

        for entry in &self.entries {
            let Some(params) = entry.pattern.matches(path) else {
                continue;
            };
            if entry.route.method_allowed(method) {
                return RouterOutcome::Matched(RouteMatch {
                    route: entry.route.clone(),
                    params,
                });
            }
            allowed.extend(entry.route.methods.iter().cloned());
        }

        if allowed.is_empty() {
            RouterOutcome::NotFound
        } else {
            RouterOutcome::MethodNotAllowed(allowed.into_iter().collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn route(id: &str, pattern: &str, methods: &[&str]) -> Route {
        Route {
            id: id.into(),
            path_pattern: pattern.into(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
            upstream_url: "http://127.0.0.1:9000".into(),
            auth_required: false,
            auth_roles: vec![],
            timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn literal_route_beats_parametric_route_for_same_path() {
        let router = Router::new(vec![
            route("param", "/api/{x}", &["GET"]),
            route("literal", "/api/users", &["GET"]),
        ])
        .unwrap();

        match router.match_route("/api/users", "GET") {
            RouterOutcome::Matched(m) => assert_eq!(m.route.id, "literal"),
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn parametric_route_still_matches_other_paths() {
        let router = Router::new(vec![
            route("param", "/api/{x}", &["GET"]),
            route("literal", "/api/users", &["GET"]),
        ])
        .unwrap();

        match router.match_route("/api/42", "GET") {
            RouterOutcome::Matched(m) => {
                assert_eq!(m.route.id, "param");
                assert_eq!(m.params, vec![("x".to_string(), "42".to_string())]);
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn method_mismatch_yields_method_not_allowed_with_sorted_allow_set() {
        let router = Router::new(vec![route("x", "/x", &["GET", "POST"])]).unwrap();
        match router.match_route("/x", "DELETE") {
            RouterOutcome::MethodNotAllowed(allowed) => {
                assert_eq!(allowed, vec!["GET".to_string(), "POST".to_string()]);
            }
            other => panic!("expected method not allowed, got {other:?}"),
        }
    }

    #[test]
    fn unmatched_path_is_not_found() {
        let router = Router::new(vec![route("x", "/x", &["GET"])]).unwrap();
        assert!(matches!(
            router.match_route("/y", "GET"),
            RouterOutcome::NotFound
        ));
    }

    #[test]
    fn duplicate_parameter_names_fail_construction() {
        let err = Router::new(vec![route("bad", "/a/{id}/{id}", &["GET"])]).unwrap_err();
        assert!(matches!(err, RouterError::InvalidPattern { .. }));
    }
}
