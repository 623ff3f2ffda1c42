//! Target URLs with an optional `@label@` prefix.
//!
//! A configured target looks like `[@<label>@]<url>`. The label is carried
//! along with every record scraped from that URL so that several endpoints
//! behind one tag can be told apart downstream.

use std::fmt;

use regex::Regex;

use crate::error::{ConfigError, Result};

const LABELED_URL_PATTERN: &str = r"(?s)^(?:@(?P<label>[^@]*)@)?(?P<url>.*)$";

/// A scrape target resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledUrl {
    url: String,
    label: Option<String>,
}

impl LabeledUrl {
    /// Create a target from its parts.
    pub fn new(url: impl Into<String>, label: Option<String>) -> Self {
        Self {
            url: url.into(),
            label,
        }
    }

    /// Resolve a single raw target string.
    pub fn parse(raw: &str) -> Result<Self> {
        TargetResolver::new()?.resolve(raw)
    }

    /// Resolve every configured target, keeping configuration order.
    pub fn parse_all<I, S>(raws: I) -> Result<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let resolver = TargetResolver::new()?;
        raws.into_iter()
            .map(|raw| resolver.resolve(raw.as_ref()))
            .collect()
    }

    /// The URL to scrape.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The label, if one was given. `Some("")` means `@@` was used.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl fmt::Display for LabeledUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Splits raw target strings into label and URL.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    pattern: Regex,
}

impl TargetResolver {
    /// Compile the target pattern.
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(LABELED_URL_PATTERN)?,
        })
    }

    /// Resolve one raw target string.
    pub fn resolve(&self, raw: &str) -> Result<LabeledUrl> {
        let caps = self
            .pattern
            .captures(raw)
            .ok_or_else(|| ConfigError::InvalidTarget(raw.to_string()))?;

        let url = caps
            .name("url")
            .map(|m| m.as_str())
            .ok_or_else(|| ConfigError::InvalidTarget(raw.to_string()))?;
        let label = caps.name("label").map(|m| m.as_str().to_string());

        Ok(LabeledUrl::new(url, label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_without_label() {
        let target = LabeledUrl::parse("http://test.local/metrics/").unwrap();
        assert_eq!(target.url(), "http://test.local/metrics/");
        assert_eq!(target.label(), None);
    }

    #[test]
    fn test_url_with_empty_label() {
        let target = LabeledUrl::parse("@@http://test2.local/metrics/").unwrap();
        assert_eq!(target.url(), "http://test2.local/metrics/");
        assert_eq!(target.label(), Some(""));
    }

    #[test]
    fn test_url_with_label() {
        let target = LabeledUrl::parse("@test-label@http://test3.local/metrics/").unwrap();
        assert_eq!(target.url(), "http://test3.local/metrics/");
        assert_eq!(target.label(), Some("test-label"));
    }

    #[test]
    fn test_unterminated_label_is_part_of_url() {
        let target = LabeledUrl::parse("@east").unwrap();
        assert_eq!(target.url(), "@east");
        assert_eq!(target.label(), None);
    }

    #[test]
    fn test_only_first_label_is_stripped() {
        let target = LabeledUrl::parse("@a@@b@http://h/").unwrap();
        assert_eq!(target.label(), Some("a"));
        assert_eq!(target.url(), "@b@http://h/");
    }

    #[test]
    fn test_parse_all_keeps_order() {
        let targets =
            LabeledUrl::parse_all(["@one@http://a/", "http://b/", "@@http://c/"]).unwrap();
        let urls: Vec<_> = targets.iter().map(LabeledUrl::url).collect();
        assert_eq!(urls, vec!["http://a/", "http://b/", "http://c/"]);
        assert_eq!(targets[0].label(), Some("one"));
        assert_eq!(targets[1].label(), None);
        assert_eq!(targets[2].label(), Some(""));
    }

    #[test]
    fn test_display_is_url() {
        let target = LabeledUrl::parse("@east@http://h/metrics").unwrap();
        assert_eq!(target.to_string(), "http://h/metrics");
    }
}
