//! HTTP verb matching implementation.

use super::{MatchResult, Matcher, MatcherError};
use regex::Regex;

/// Compiled verb expression.
///
/// The expression is a regular expression anchored to the whole method and
/// evaluated case-insensitively, so `POST|PUT` accepts `post` but not `POSTX`.
/// A lone `*` accepts every method.
#[derive(Debug)]
pub enum MethodMatcher {
    /// Any method
    Any,
    /// Anchored, case-insensitive expression
    Pattern(Regex),
}

impl MethodMatcher {
    /// Compile a verb expression.
    pub fn compile(verbs: &str) -> Result<Self, MatcherError> {
        let verbs = verbs.trim();
        if verbs.is_empty() {
            return Err(MatcherError::EmptyVerbs);
        }
        if verbs == "*" {
            return Ok(Self::Any);
        }

        let regex = Regex::new(&format!("(?i)^(?:{})$", verbs))?;
        Ok(Self::Pattern(regex))
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, method: &str) -> MatchResult {
        let matched = match self {
            Self::Any => true,
            Self::Pattern(regex) => regex.is_match(method),
        };

        if matched {
            MatchResult::matched()
        } else {
            MatchResult::not_matched()
        }
    }
}
