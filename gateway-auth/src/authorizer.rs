use std::collections::HashSet;

/// A route with no required roles is open to any authenticated session;
/// otherwise the session must hold at least one of them.
pub struct Authorizer;

impl Authorizer {
    pub fn authorize(session_roles: &[String], required_roles: &[String]) -> bool {
        if required_roles.is_empty() {
            return true;
        }
        let have: HashSet<&str> = session_roles.iter().map(String::as_str).collect();
        required_roles.iter().any(|r| have.contains(r.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_required_roles_always_authorized() {
        assert!(Authorizer::authorize(&[], &[]));
    }

    #[test]
    fn intersection_required() {
        let session_roles = vec!["editor".to_string()];
        assert!(Authorizer::authorize(&session_roles, &["admin".to_string(), "editor".to_string()]));
        assert!(!Authorizer::authorize(&session_roles, &["admin".to_string()]));
    }
}
