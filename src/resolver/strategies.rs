//! Issue-number extraction strategies
//!
//! Each strategy is a pure function from page markup to an optional
//! [`IssueNumber`]. Captures that do not parse to a positive number are
//! skipped, so "Issue 0" never counts as an issue.

use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::types::IssueNumber;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// Which strategy produced a resolution (diagnostics only)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Hosting-platform embed reference on the primary page
    Embed,
    /// Explicit link to an issue document on the primary page
    ExplicitLink,
    /// "Issue N" inside the title element of the primary page
    Title,
    /// First "Issue N" anywhere on the primary page
    LooseText,
    /// Highest "Issue N" among the links of the directory page
    Directory,
}

impl Strategy {
    /// Primary-page strategies in priority order
    pub const PRIMARY: [Strategy; 4] = [
        Strategy::Embed,
        Strategy::ExplicitLink,
        Strategy::Title,
        Strategy::LooseText,
    ];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strategy::Embed => "embed",
            Strategy::ExplicitLink => "explicit_link",
            Strategy::Title => "title",
            Strategy::LooseText => "loose_text",
            Strategy::Directory => "directory",
        };
        f.write_str(s)
    }
}

/// Compiled patterns for every strategy
#[derive(Clone, Debug)]
pub struct ExtractionPatterns {
    embed: Regex,
    link: Regex,
    title: Regex,
    issue_text: Regex,
    anchor: Regex,
    tag: Regex,
    entity: Regex,
}

impl ExtractionPatterns {
    /// Build the patterns for a resolver configuration
    ///
    /// The explicit-link pattern is derived from `issue_base_url`, so any URL
    /// produced by [`build_issue_url`](super::build_issue_url) is matched by it.
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        let embed = format!(
            r"(?i){}issue[_-]?(\d+)",
            regex::escape(config.embed_marker.trim())
        );
        let link = format!(
            r"(?i){}/issue[_-]?(\d+)",
            link_prefix_pattern(&config.issue_base_url)?
        );

        Ok(Self {
            embed: compile(&embed)?,
            link: compile(&link)?,
            title: compile(
                r#"(?i)<(?:p|h[1-6]|div|span)\b[^>]*\bclass\s*=\s*["'][^"']*\btitle\b[^"']*["'][^>]*>\s*Issue\s+(\d+)"#,
            )?,
            issue_text: compile(r"(?i)Issue\s+(\d+)")?,
            anchor: compile(r"(?is)<a\b[^>]*>(.*?)</a\s*>")?,
            tag: compile(r"(?s)<[^>]*>")?,
            entity: compile(r"(?i)&(?:#(\d{1,7})|#x([0-9a-f]{1,6})|(nbsp|amp));")?,
        })
    }

    /// Run one primary-page strategy against the page markup
    pub fn extract(&self, strategy: Strategy, html: &str) -> Option<IssueNumber> {
        match strategy {
            Strategy::Embed => first_issue(&self.embed, html),
            Strategy::ExplicitLink => first_issue(&self.link, html),
            Strategy::Title => first_issue(&self.title, html),
            Strategy::LooseText => first_issue(&self.issue_text, html),
            Strategy::Directory => self.highest_linked_issue(html),
        }
    }

    /// Try the primary-page strategies in priority order; first hit wins
    pub fn extract_primary(&self, html: &str) -> Option<(IssueNumber, Strategy)> {
        Strategy::PRIMARY
            .iter()
            .find_map(|&strategy| self.extract(strategy, html).map(|n| (n, strategy)))
    }

    /// Highest "Issue N" across the text of every hyperlink
    ///
    /// Directory listings are unordered, so every link is scanned.
    pub fn highest_linked_issue(&self, html: &str) -> Option<IssueNumber> {
        self.anchor
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .map(|inner| self.link_text(inner.as_str()))
            .flat_map(|text| {
                self.issue_text
                    .captures_iter(&text)
                    .filter_map(|caps| caps.get(1).and_then(|m| IssueNumber::parse_digits(m.as_str())))
                    .collect::<Vec<_>>()
            })
            .max()
    }

    /// Visible text of an anchor's inner markup
    ///
    /// Numeric character references are decoded, plus `&nbsp;` and `&amp;`.
    /// Other named entities are left as written.
    fn link_text(&self, inner: &str) -> String {
        let text = self.tag.replace_all(inner, " ");
        self.entity
            .replace_all(&text, |caps: &regex::Captures<'_>| {
                let decoded = if let Some(dec) = caps.get(1) {
                    dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
                } else if let Some(hex) = caps.get(2) {
                    u32::from_str_radix(hex.as_str(), 16)
                        .ok()
                        .and_then(char::from_u32)
                } else if caps
                    .get(3)
                    .is_some_and(|name| name.as_str().eq_ignore_ascii_case("amp"))
                {
                    Some('&')
                } else {
                    Some(' ')
                };
                match decoded {
                    Some('\u{a0}') => " ".to_string(),
                    Some(c) => c.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// First capture that parses to a positive issue number
fn first_issue(pattern: &Regex, haystack: &str) -> Option<IssueNumber> {
    pattern
        .captures_iter(haystack)
        .find_map(|caps| caps.get(1).and_then(|m| IssueNumber::parse_digits(m.as_str())))
}

/// Scheme-less, `www.`-optional pattern for the issue base URL
fn link_prefix_pattern(issue_base_url: &str) -> Result<String> {
    let url = url::Url::parse(issue_base_url).map_err(|e| {
        Error::config(
            "resolver.issue_base_url",
            format!("invalid URL {issue_base_url:?}: {e}"),
        )
    })?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::config("resolver.issue_base_url", "URL has no host"))?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    let path = url.path().trim_end_matches('/');

    // Url drops a port equal to the scheme default, but the page may still spell it out.
    let port = match (url.port(), url.port_or_known_default()) {
        (Some(port), _) => regex::escape(&format!(":{port}")),
        (None, Some(default)) => format!("(?::{default})?"),
        (None, None) => String::new(),
    };

    Ok(format!(
        r"(?:www\.)?{}{}{}",
        regex::escape(host),
        port,
        regex::escape(path)
    ))
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Other(format!("invalid extraction pattern: {e}")))
}
