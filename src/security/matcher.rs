//! JSON-RPC method allow-list matching.
//!
//! # Responsibilities
//! - Compile the configured allow-list once at startup
//! - Answer "may this method be called?" on the request path
//!
//! # Design Decisions
//! - Method names are case-sensitive
//! - Exact names checked first (hash lookup), then trailing-`*` prefixes
//! - Empty allow-list = every method allowed (pass-through deployment)
//! - No regex to guarantee O(n) matching

use std::collections::HashSet;
use thiserror::Error;

/// Errors raised while compiling an allow-list.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatcherError {
    #[error("invalid method pattern {0:?}: patterns must be non-empty and may only end with '*'")]
    InvalidPattern(String),
}

/// Compiled method allow-list.
#[derive(Debug, Clone, Default)]
pub struct MethodMatcher {
    exact: HashSet<String>,
    prefixes: Vec<String>,
    allow_all: bool,
}

impl MethodMatcher {
    /// Compile an allow-list.
    ///
    /// Patterns are trimmed, sorted and deduplicated before compilation.
    pub fn new<I, S>(patterns: I) -> Result<Self, MatcherError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .collect();
        patterns.sort();
        patterns.dedup();

        let mut matcher = Self {
            allow_all: patterns.is_empty(),
            ..Self::default()
        };

        for pattern in patterns {
            match pattern.find('*') {
                _ if pattern.is_empty() => return Err(MatcherError::InvalidPattern(pattern)),
                None => {
                    matcher.exact.insert(pattern);
                }
                Some(pos) if pos == pattern.len() - 1 => {
                    matcher.prefixes.push(pattern[..pos].to_string());
                }
                Some(_) => return Err(MatcherError::InvalidPattern(pattern)),
            }
        }

        Ok(matcher)
    }

    /// Returns true if `method` may be forwarded.
    pub fn is_allowed(&self, method: &str) -> bool {
        self.allow_all
            || self.exact.contains(method)
            || self.prefixes.iter().any(|p| method.starts_with(p.as_str()))
    }

    /// True when the allow-list was empty.
    pub fn allows_everything(&self) -> bool {
        self.allow_all
    }
}
