//! Path and method matching primitives.
//!
//! # Responsibilities
//! - Split a path into segments
//! - Classify registration segments as literal or wildcard
//! - Match request methods against a route's allow-list
//!
//! # Design Decisions
//! - Leading and trailing slashes carry no meaning
//! - Path matching is case-sensitive, method matching is not
//! - Empty allow-list = always matches
//! - No regex to guarantee O(n) matching

use axum::http::Method;

/// Split a path into its segments.
///
/// Leading and trailing slashes are ignored, so `""`, `"/"` and `"///"` all
/// yield no segments (the root). Interior empty segments are kept.
pub fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split('/').collect()
}

/// A registration segment matches any single path component when it begins
/// with `*` or `:`.
pub fn is_wildcard(segment: &str) -> bool {
    segment.starts_with('*') || segment.starts_with(':')
}

/// Case-insensitive method allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodFilter {
    allowed: Vec<String>,
}

impl MethodFilter {
    pub fn new<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: methods
                .into_iter()
                .map(|m| m.as_ref().trim().to_ascii_uppercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// Returns true if the method may be forwarded.
    pub fn allows(&self, method: &Method) -> bool {
        self.allowed.is_empty()
            || self
                .allowed
                .iter()
                .any(|m| m.eq_ignore_ascii_case(method.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        assert!(split_path("").is_empty());
        assert!(split_path("/").is_empty());
        assert!(split_path("///").is_empty());
        assert_eq!(split_path("/api/users/"), vec!["api", "users"]);
        assert_eq!(split_path("api/users"), vec!["api", "users"]);
        assert_eq!(split_path("/a//b"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_wildcard_segments() {
        assert!(is_wildcard("*"));
        assert!(is_wildcard("*rest"));
        assert!(is_wildcard(":id"));
        assert!(!is_wildcard("users"));
        assert!(!is_wildcard("a*"));
    }

    #[test]
    fn test_method_filter() {
        let get_only = MethodFilter::new(["get"]);
        assert!(get_only.allows(&Method::GET));
        assert!(!get_only.allows(&Method::POST));

        let any = MethodFilter::new(Vec::<String>::new());
        assert!(any.allows(&Method::DELETE));
        assert!(any.allows(&Method::from_bytes(b"PURGE").unwrap()));
    }
}
