//! Route pattern matching.
//!
//! Patterns are glob-ish strings where `*` matches any run of
//! characters. A pattern containing `://` matches against the full
//! normalized URL (cross-origin routes); anything else matches against
//! the path only (same-origin routes).

use furrow_core::Error;
use regex::Regex;
use url::Url;

/// A compiled route matcher.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    raw: String,
    regex: Regex,
    full_url: bool,
}

impl RoutePattern {
    /// Compile a pattern string.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for an empty pattern.
    pub fn compile(pattern: &str) -> Result<Self, Error> {
        if pattern.is_empty() {
            return Err(Error::InvalidInput("route pattern cannot be empty".into()));
        }

        let escaped: Vec<String> = pattern.split('*').map(regex::escape).collect();
        let source = format!("^{}$", escaped.join(".*"));
        let regex = Regex::new(&source)
            .map_err(|e| Error::InvalidInput(format!("route pattern {pattern:?} did not compile: {e}")))?;

        Ok(Self { raw: pattern.to_string(), regex, full_url: pattern.contains("://") })
    }

    /// Whether this pattern accepts the given normalized URL.
    pub fn matches(&self, url: &Url) -> bool {
        if self.full_url { self.regex.is_match(url.as_str()) } else { self.regex.is_match(url.path()) }
    }

    /// The original pattern string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}
