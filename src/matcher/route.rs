//! Route pattern matching implementation.

use super::{MatchResult, Matcher, MatcherError};
use regex::Regex;
use std::collections::HashMap;

/// Compiled route pattern.
///
/// Pattern syntax:
/// - literal text matches itself (case-insensitive)
/// - `:name` matches one non-empty path segment and captures it
/// - `*name` matches the rest of the path and captures it
/// - `*` matches the rest of the path without capturing
///
/// A single trailing slash on the request path is tolerated.
#[derive(Debug)]
pub struct RouteMatcher {
    /// Anchored regex built from the pattern
    regex: Regex,
}

impl RouteMatcher {
    /// Compile a route pattern.
    pub fn compile(pattern: &str) -> Result<Self, MatcherError> {
        let mut source = String::from("(?i)^");
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                ':' | '*' => {
                    let mut name = String::new();
                    while let Some(&next) = chars.peek() {
                        if next.is_ascii_alphanumeric() || next == '_' {
                            name.push(next);
                            chars.next();
                        } else {
                            break;
                        }
                    }

                    match (c, name.is_empty()) {
                        (':', true) => {
                            return Err(MatcherError::InvalidRoute {
                                pattern: pattern.to_string(),
                                reason: "parameter without a name".to_string(),
                            })
                        }
                        (':', false) => source.push_str(&format!("(?P<{}>[^/]+)", name)),
                        (_, true) => source.push_str(".+"),
                        (_, false) => source.push_str(&format!("(?P<{}>.+)", name)),
                    }
                }
                other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }

        if !pattern.ends_with('/') {
            source.push_str("/?");
        }
        source.push('$');

        Ok(Self {
            regex: Regex::new(&source)?,
        })
    }

    /// Extract named captures from a match.
    fn extract_captures(&self, path: &str) -> HashMap<String, String> {
        let mut captures = HashMap::new();

        if let Some(caps) = self.regex.captures(path) {
            for name in self.regex.capture_names().flatten() {
                if let Some(m) = caps.name(name) {
                    captures.insert(name.to_string(), m.as_str().to_string());
                }
            }
        }

        captures
    }
}

impl Matcher for RouteMatcher {
    fn matches(&self, path: &str) -> MatchResult {
        if self.regex.is_match(path) {
            MatchResult::matched_with_captures(self.extract_captures(path))
        } else {
            MatchResult::not_matched()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_route() {
        let matcher = RouteMatcher::compile("/api/users").unwrap();

        assert!(matcher.matches("/api/users").matched);
        assert!(matcher.matches("/api/users/").matched);
        assert!(matcher.matches("/API/Users").matched);
        assert!(!matcher.matches("/api/users/123").matched);
        assert!(!matcher.matches("/api/user").matched);
    }

    #[test]
    fn test_named_parameter() {
        let matcher = RouteMatcher::compile("/api/users/:id").unwrap();

        let result = matcher.matches("/api/users/123");
        assert!(result.matched);
        assert_eq!(result.captures.get("id"), Some(&"123".to_string()));

        assert!(!matcher.matches("/api/users/").matched);
        assert!(!matcher.matches("/api/users/123/orders").matched);
    }

    #[test]
    fn test_multiple_parameters() {
        let matcher = RouteMatcher::compile("/api/users/:user_id/orders/:order_id").unwrap();

        let result = matcher.matches("/api/users/7/orders/42");
        assert!(result.matched);
        assert_eq!(result.captures.get("user_id"), Some(&"7".to_string()));
        assert_eq!(result.captures.get("order_id"), Some(&"42".to_string()));
    }

    #[test]
    fn test_wildcards() {
        let matcher = RouteMatcher::compile("/static/*path").unwrap();
        let result = matcher.matches("/static/css/site.css");
        assert!(result.matched);
        assert_eq!(
            result.captures.get("path"),
            Some(&"css/site.css".to_string())
        );

        let matcher = RouteMatcher::compile("/api/*").unwrap();
        let result = matcher.matches("/api/anything/at/all");
        assert!(result.matched);
        assert!(result.captures.is_empty());
        assert!(!matcher.matches("/api/").matched);
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let matcher = RouteMatcher::compile("/api/v1.0/items").unwrap();
        assert!(matcher.matches("/api/v1.0/items").matched);
        assert!(!matcher.matches("/api/v1x0/items").matched);
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(RouteMatcher::compile("/users/:").is_err());
        // Duplicate parameter names are rejected by the regex engine
        assert!(RouteMatcher::compile("/users/:id/friends/:id").is_err());
    }
}
