//! Latest-issue resolution.
//!
//! The resolver consults two sources of decreasing reliability:
//!
//! 1. The publisher's "current issue" page (primary site), tried with four
//!    strategies in priority order: embed reference, explicit document link,
//!    title element, loose "Issue N" text. First hit wins.
//! 2. The publisher's directory listing on the hosting platform (secondary
//!    site), consulted only when the primary page is unreachable or yields
//!    nothing. Every link is scanned and the highest issue number wins.
//!
//! Primary-site network failures are logged and fall through; secondary-site
//! failures are returned as [`ResolutionError`].

mod strategies;

pub use strategies::{ExtractionPatterns, Strategy};

use crate::config::ResolverConfig;
use crate::error::{Error, ResolutionError, Result};
use crate::types::{IssueNumber, IssueReference};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Issue number together with the strategy that produced it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved latest issue
    pub number: IssueNumber,
    /// Provenance, for logs only
    pub strategy: Strategy,
}

/// Source of the current latest issue number
///
/// [`IssueResolver`] is the production implementation; the coordinator only
/// depends on this trait so tests can script resolution results.
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// Determine the latest published issue
    async fn resolve_latest_issue_number(&self) -> std::result::Result<Resolution, ResolutionError>;
}

/// Build the document URL for an issue: `{base_url}/issue_{number}`
///
/// # Examples
///
/// ```
/// use issue_dl::resolver::build_issue_url;
/// use issue_dl::IssueNumber;
///
/// let n = IssueNumber::new(305).unwrap();
/// assert_eq!(
///     build_issue_url("https://issuu.com/thebpview/docs", n),
///     "https://issuu.com/thebpview/docs/issue_305"
/// );
/// ```
pub fn build_issue_url(base_url: &str, number: IssueNumber) -> String {
    format!("{}/issue_{}", base_url.trim_end_matches('/'), number)
}

/// Resolver that scrapes the primary and secondary pages over HTTP
pub struct IssueResolver {
    /// HTTP client for fetching pages
    http_client: reqwest::Client,

    /// Page locations and request settings
    config: ResolverConfig,

    /// Compiled extraction patterns
    patterns: ExtractionPatterns,
}

impl IssueResolver {
    /// Create a resolver
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created or the configured
    /// base URL cannot be turned into an extraction pattern
    pub fn new(config: ResolverConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;
        let patterns = ExtractionPatterns::new(&config)?;

        Ok(Self {
            http_client,
            config,
            patterns,
        })
    }

    /// Document URL for an issue under the configured base
    pub fn build_issue_url(&self, number: IssueNumber) -> String {
        build_issue_url(&self.config.issue_base_url, number)
    }

    /// Issue reference (number plus derived URL)
    pub fn issue_reference(&self, number: IssueNumber) -> IssueReference {
        IssueReference {
            number,
            url: self.build_issue_url(number),
        }
    }

    /// Resolve the latest issue and return its document URL
    pub async fn latest_issue_url(&self) -> std::result::Result<String, ResolutionError> {
        let resolution = self.resolve_latest_issue_number().await?;
        Ok(self.build_issue_url(resolution.number))
    }

    /// Primary-page strategies; `None` when unreachable or nothing matched
    async fn resolve_from_primary(&self) -> Option<Resolution> {
        let url = &self.config.primary_page_url;
        let html = match self.fetch_page(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = %url, error = %e, "Could not use current-issue page");
                return None;
            }
        };

        match self.patterns.extract_primary(&html) {
            Some((number, strategy)) => Some(Resolution { number, strategy }),
            None => {
                debug!(url = %url, "No issue number on current-issue page");
                None
            }
        }
    }

    /// Directory listing scan; errors are fatal for the resolution
    async fn resolve_from_directory(&self) -> std::result::Result<Resolution, ResolutionError> {
        let html = self.fetch_page(&self.config.directory_page_url).await?;

        self.patterns
            .highest_linked_issue(&html)
            .map(|number| Resolution {
                number,
                strategy: Strategy::Directory,
            })
            .ok_or(ResolutionError::NoIssueNumbers)
    }

    async fn fetch_page(&self, url: &str) -> std::result::Result<String, ResolutionError> {
        debug!(url = %url, "Fetching page");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolutionError::Unreachable {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolutionError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| ResolutionError::Unreachable {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl IssueSource for IssueResolver {
    async fn resolve_latest_issue_number(&self) -> std::result::Result<Resolution, ResolutionError> {
        let resolution = match self.resolve_from_primary().await {
            Some(resolution) => resolution,
            None => self.resolve_from_directory().await.inspect_err(|e| {
                tracing::error!(error = %e, "Error getting latest issue number");
            })?,
        };

        info!(
            issue = %resolution.number,
            strategy = %resolution.strategy,
            "Latest issue number resolved"
        );
        Ok(resolution)
    }
}
