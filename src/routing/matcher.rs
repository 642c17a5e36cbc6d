//! Path pattern parsing and matching.
//!
//! # Responsibilities
//! - Normalize authored patterns (leading `/`, empty → `/`)
//! - Derive the match mode from the trailing `$` marker
//! - Test a path against a pattern (prefix or exact)
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - A single trailing `$` selects exact matching and is stripped
//! - `$$` is the escape for a literal trailing `$` (prefix mode)
//! - No regex: matching is a single `==` or `starts_with`

use std::fmt;

use serde::Serialize;

/// How a pattern is compared against a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Path starts with the pattern.
    Prefix,
    /// Path equals the pattern.
    Exact,
}

/// A normalized rule pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    path: String,
    mode: MatchMode,
    specificity: usize,
}

impl PathPattern {
    /// Parse an authored pattern.
    ///
    /// The marker is read before normalization, so `"$"` is the exact root.
    pub fn parse(authored: &str) -> Self {
        let (body, mode) = if let Some(stripped) = authored.strip_suffix("$$") {
            (format!("{}$", stripped), MatchMode::Prefix)
        } else if let Some(stripped) = authored.strip_suffix('$') {
            (stripped.to_string(), MatchMode::Exact)
        } else {
            (authored.to_string(), MatchMode::Prefix)
        };

        let path = if body.starts_with('/') {
            body
        } else {
            format!("/{}", body)
        };
        let specificity = path.chars().count();

        Self {
            path,
            mode,
            specificity,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Pattern length in characters; longer patterns are more specific.
    pub fn specificity(&self) -> usize {
        self.specificity
    }

    /// Returns true if `path` satisfies this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match self.mode {
            MatchMode::Exact => path == self.path,
            MatchMode::Prefix => path.starts_with(&self.path),
        }
    }

    /// The part of `path` left over after this pattern, if it matches.
    pub fn remainder<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.matches(path) {
            Some(&path[self.path.len()..])
        } else {
            None
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            MatchMode::Exact => write!(f, "{}$", self.path),
            MatchMode::Prefix => write!(f, "{}", self.path),
        }
    }
}

/// Normalize a leftover path so it can be matched by a nested table.
pub fn normalize_remainder(remainder: &str) -> String {
    if remainder.starts_with('/') {
        remainder.to_string()
    } else {
        format!("/{}", remainder)
    }
}
