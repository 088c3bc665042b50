use std::fmt;

use url::form_urlencoded;

/// A navigation target: a path plus decoded query pairs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Location {
    /// Parse `path?query`. The path is normalized to start with `/` and to
    /// carry no trailing slash (except the root).
    pub fn parse(raw: &str) -> Self {
        let (path, query) = match raw.split_once('?') {
            Some((path, query)) => (path, query),
            None => (raw, ""),
        };

        let query = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Self {
            path: normalize_path(path),
            query,
        }
    }

    pub fn with_query(path: &str, key: &str, value: &str) -> Self {
        Self {
            path: normalize_path(path),
            query: vec![(key.to_string(), value.to_string())],
        }
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Path with its encoded query string
    pub fn full_path(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        format!("{}?{}", self.path, query)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path())
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_normalize() {
        assert_eq!(Location::parse("").path, "/");
        assert_eq!(Location::parse("/").path, "/");
        assert_eq!(Location::parse("management/").path, "/management");

        let loc = Location::parse("/login?redirect=%2Fmanagement%3Ftab%3Dports&x=1");
        assert_eq!(loc.path, "/login");
        assert_eq!(loc.query_value("redirect"), Some("/management?tab=ports"));
        assert_eq!(loc.query_value("x"), Some("1"));
        assert_eq!(loc.query_value("missing"), None);
    }

    #[test]
    fn test_full_path_encodes_query() {
        let loc = Location::with_query("/login", "redirect", "/management?tab=ports");
        assert_eq!(loc.full_path(), "/login?redirect=%2Fmanagement%3Ftab%3Dports");
        assert_eq!(Location::parse(&loc.full_path()), loc);
        assert_eq!(Location::parse("/management").to_string(), "/management");
    }
}
