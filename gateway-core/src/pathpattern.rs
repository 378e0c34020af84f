use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Parameter(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("duplicate parameter name '{0}' in pattern")]
    DuplicateParameter(String),
    #[error("empty parameter name in pattern segment '{0}'")]
    EmptyParameterName(String),
}

/// A compiled route pattern: an ordered list of literal or `{name}`
/// parameter segments. Compilation is deterministic and side-effect-free.
#[derive(Debug, Clone)]
pub struct PathPattern {
    pub raw: String,
    pub segments: Vec<Segment>,
}

impl PathPattern {
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let mut seen = HashSet::new();
        let mut segments = Vec::new();

        for raw_seg in pattern.split('/').filter(|s| !s.is_empty()) {
            if let Some(name) = raw_seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                if name.is_empty() {
                    return Err(PatternError::EmptyParameterName(raw_seg.to_string()));
                }
                if !seen.insert(name.to_string()) {
                    return Err(PatternError::DuplicateParameter(name.to_string()));
                }
                segments.push(Segment::Parameter(name.to_string()));
            } else {
                segments.push(Segment::Literal(raw_seg.to_string()));
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Matches a normalized, decoded request path against this pattern,
    /// returning captured parameters in pattern order on success.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let normalized = normalize(path);
        let input: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
        if input.len() != self.segments.len() {
            return None;
        }

        let mut params = Vec::new();
        for (pattern_seg, input_seg) in self.segments.iter().zip(input.iter()) {
            match pattern_seg {
                Segment::Literal(lit) => {
                    if lit != input_seg {
                        return None;
                    }
                }
                Segment::Parameter(name) => {
                    params.push((name.clone(), (*input_seg).to_string()));
                }
            }
        }
        Some(params)
    }
}

/// Prepend `/` if absent; strip a single trailing `/` unless the path is `/`.
pub fn normalize(path: &str) -> String {
    let mut normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_literal_and_parameter_segments() {
        let p = PathPattern::compile("/api/users/{id}").unwrap();
        assert_eq!(
            p.segments,
            vec![
                Segment::Literal("api".into()),
                Segment::Literal("users".into()),
                Segment::Parameter("id".into()),
            ]
        );
    }

    #[test]
    fn rejects_duplicate_parameter_names() {
        let err = PathPattern::compile("/a/{id}/b/{id}").unwrap_err();
        assert_eq!(err, PatternError::DuplicateParameter("id".into()));
    }

    #[test]
    fn matches_literal_exactly() {
        let p = PathPattern::compile("/api/users").unwrap();
        assert!(p.matches("/api/users").is_some());
        assert!(p.matches("/api/user").is_none());
    }

    #[test]
    fn captures_parameter_value() {
        let p = PathPattern::compile("/u/{id}").unwrap();
        let params = p.matches("/u/42").unwrap();
        assert_eq!(params, vec![("id".to_string(), "42".to_string())]);
    }

    #[test]
    fn segment_count_mismatch_fails() {
        let p = PathPattern::compile("/u/{id}").unwrap();
        assert!(p.matches("/u/42/extra").is_none());
        assert!(p.matches("/u").is_none());
    }

    #[test]
    fn normalizes_missing_leading_and_trailing_slash() {
        assert_eq!(normalize("api/x"), "/api/x");
        assert_eq!(normalize("/api/x/"), "/api/x");
        assert_eq!(normalize("/"), "/");
    }
}
