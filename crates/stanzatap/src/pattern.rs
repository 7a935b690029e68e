//! Stanza matchers.
//!
//! Filters and mangle rules test stanza text against a [`Pattern`]. A pattern
//! is either a compiled regex or a custom predicate; callers hand one in as a
//! [`PatternSpec`], which may still be text that gets compiled once at
//! configuration time.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::{Error, Result};

type Predicate = dyn Fn(&str) -> bool + Send + Sync;

/// A compiled matcher with a uniform `matches` capability.
#[derive(Clone)]
pub enum Pattern {
    /// A regular expression.
    Regex(Regex),
    /// Any predicate over stanza text.
    Custom {
        /// Label used in log output.
        label: String,
        /// The predicate.
        test: Arc<Predicate>,
    },
}

impl Pattern {
    /// Compile a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if `source` is not a valid regex.
    pub fn regex(source: &str) -> Result<Self> {
        Regex::new(source)
            .map(Self::Regex)
            .map_err(|e| Error::invalid_pattern(source, e))
    }

    /// Wrap an arbitrary predicate.
    pub fn custom(
        label: impl Into<String>,
        test: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::Custom {
            label: label.into(),
            test: Arc::new(test),
        }
    }

    /// Check if the text matches.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Regex(re) => re.is_match(text),
            Self::Custom { test, .. } => test(text),
        }
    }

    /// The regex source, if this is a regex pattern.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Regex(re) => Some(re.as_str()),
            Self::Custom { .. } => None,
        }
    }

    /// Persisted form of the pattern: the regex source wrapped in slashes.
    ///
    /// Custom predicates have no textual form.
    #[must_use]
    pub fn to_persisted(&self) -> Option<String> {
        self.source().map(|src| format!("/{src}/"))
    }

    /// Parse the persisted form written by [`Pattern::to_persisted`].
    ///
    /// The first and last characters are dropped and the remainder compiled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFilter`] if the stored text is too short to
    /// carry delimiters, or [`Error::InvalidPattern`] if the remainder does not
    /// compile.
    pub fn from_persisted(stored: &str) -> Result<Self> {
        let mut chars = stored.chars();
        if chars.next().is_none() || chars.next_back().is_none() {
            return Err(Error::MalformedFilter {
                value: stored.to_string(),
            });
        }
        Self::regex(chars.as_str())
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Self::Custom { label, .. } => f.debug_struct("Custom").field("label", label).finish(),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regex(re) => write!(f, "/{}/", re.as_str()),
            Self::Custom { label, .. } => write!(f, "<{label}>"),
        }
    }
}

/// Pattern input as accepted by the configurator.
#[derive(Debug, Clone)]
pub enum PatternSpec {
    /// A ready-made matcher.
    Compiled(Pattern),
    /// Regex source still to be compiled.
    Text(String),
}

impl PatternSpec {
    /// Compile the spec into a [`Pattern`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if text does not compile.
    pub fn compile(self) -> Result<Pattern> {
        match self {
            Self::Compiled(pattern) => Ok(pattern),
            Self::Text(source) => Pattern::regex(&source),
        }
    }
}

impl From<Pattern> for PatternSpec {
    fn from(pattern: Pattern) -> Self {
        Self::Compiled(pattern)
    }
}

impl From<Regex> for PatternSpec {
    fn from(re: Regex) -> Self {
        Self::Compiled(Pattern::Regex(re))
    }
}

impl From<&str> for PatternSpec {
    fn from(source: &str) -> Self {
        Self::Text(source.to_string())
    }
}

impl From<String> for PatternSpec {
    fn from(source: String) -> Self {
        Self::Text(source)
    }
}
