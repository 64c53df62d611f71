//! Route and verb matchers.
//!
//! Every migration carries a route pattern and a verb expression. Both are
//! compiled once, when the registry is built, and only evaluated afterwards.

mod method;
mod route;

pub use method::MethodMatcher;
pub use route::RouteMatcher;

use std::collections::HashMap;

/// Trait for matching one request attribute.
pub trait Matcher: Send + Sync {
    /// Check if this matcher accepts the given value.
    fn matches(&self, value: &str) -> MatchResult;
}

/// Result of a match operation.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Whether the match succeeded
    pub matched: bool,
    /// Named route parameters (e.g. `id` for `/users/:id`)
    pub captures: HashMap<String, String>,
}

impl MatchResult {
    /// Create a successful match result.
    pub fn matched() -> Self {
        Self {
            matched: true,
            captures: HashMap::new(),
        }
    }

    /// Create a successful match result with captures.
    pub fn matched_with_captures(captures: HashMap<String, String>) -> Self {
        Self {
            matched: true,
            captures,
        }
    }

    /// Create a failed match result.
    pub fn not_matched() -> Self {
        Self {
            matched: false,
            captures: HashMap::new(),
        }
    }
}

/// Compiled route + verb matcher for one migration.
#[derive(Debug)]
pub struct CompiledMatcher {
    route: RouteMatcher,
    method: MethodMatcher,
}

impl CompiledMatcher {
    /// Compile a route pattern and a verb expression.
    pub fn compile(route: &str, verbs: &str) -> Result<Self, MatcherError> {
        Ok(Self {
            route: RouteMatcher::compile(route)?,
            method: MethodMatcher::compile(verbs)?,
        })
    }

    /// Check a request method and path.
    ///
    /// The method is checked first; route captures are only extracted when
    /// both match.
    pub fn matches(&self, method: &str, path: &str) -> MatchResult {
        if !self.method.matches(method).matched {
            return MatchResult::not_matched();
        }
        self.route.matches(path)
    }
}

/// Errors that can occur during matcher compilation.
#[derive(Debug, thiserror::Error)]
pub enum MatcherError {
    #[error("Invalid regex pattern: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("Invalid route pattern '{pattern}': {reason}")]
    InvalidRoute { pattern: String, reason: String },

    #[error("Empty verb expression")]
    EmptyVerbs,
}
