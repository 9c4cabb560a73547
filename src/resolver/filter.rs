//! Name predicates used to select instances.

use regex::Regex;

/// Decides whether an instance name is selected.
pub trait NameFilter: Send + Sync {
    fn matches(&self, name: &str) -> bool;

    /// Text used in logs and errors.
    fn describe(&self) -> &str;
}

/// Unanchored regular expression; `web` matches `web-01` and `old-web`.
#[derive(Debug, Clone)]
pub struct RegexFilter {
    pattern: String,
    regex: Regex,
}

impl RegexFilter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: pattern.to_string(),
            regex: Regex::new(pattern)?,
        })
    }
}

impl NameFilter for RegexFilter {
    fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    fn describe(&self) -> &str {
        &self.pattern
    }
}

/// Whole-name equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactFilter(pub String);

impl NameFilter for ExactFilter {
    fn matches(&self, name: &str) -> bool {
        name == self.0
    }

    fn describe(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixFilter(pub String);

impl NameFilter for PrefixFilter {
    fn matches(&self, name: &str) -> bool {
        name.starts_with(&self.0)
    }

    fn describe(&self) -> &str {
        &self.0
    }
}
