//! Shell-style glob filters over matrix fields.
//!
//! A glob is converted into an anchored, case-insensitive regular expression:
//! every regex metacharacter is escaped, then the escaped `*` and `?` are
//! re-expanded to `.*` and `.`.

use regex::{Regex, RegexBuilder};

use crate::error::MatrixError;

/// Converts a glob into the anchored regex source used for matching.
pub fn glob_to_regex(glob: &str) -> String {
    let escaped = regex::escape(glob)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    format!("^{escaped}$")
}

/// A compiled glob predicate.
#[derive(Debug, Clone)]
pub struct GlobFilter {
    pattern: String,
    regex: Regex,
}

impl GlobFilter {
    /// Compiles a glob pattern.
    ///
    /// An empty pattern is valid and matches only the empty string. Callers
    /// model "no filter" as `Option::None`, never as an empty pattern.
    pub fn new(pattern: &str) -> Result<Self, MatrixError> {
        let regex = RegexBuilder::new(&glob_to_regex(pattern))
            .case_insensitive(true)
            .build()
            .map_err(|source| MatrixError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// The glob as supplied by the user.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }
}

/// Returns true when `filter` is unset or matches `candidate`.
pub fn admits(filter: Option<&GlobFilter>, candidate: &str) -> bool {
    filter.map_or(true, |f| f.matches(candidate))
}
