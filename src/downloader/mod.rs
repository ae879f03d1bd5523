//! Document download collaborator
//!
//! The coordinator hands an [`IssueReference`] to a [`DocumentDownloader`] and
//! only learns success or failure. The document lands in the staging area under
//! its deterministic name (`issue {N}.pdf`).
//!
//! [`HttpDownloader`] fetches the reference URL directly. It writes to a
//! `.part` file first and renames on success, so a half-written document is
//! never mistaken for a finished one by the coordinator's existence check.

use crate::cache::PDF_MAGIC;
use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::staging::StagingArea;
use crate::types::IssueReference;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Retrieves an issue document into the staging area
#[async_trait]
pub trait DocumentDownloader: Send + Sync {
    /// Download `issue.url`; returns `true` once the document is staged
    ///
    /// Implementations never return errors across this boundary: failures are
    /// logged and reported as `false`.
    async fn download(&self, issue: &IssueReference) -> bool;
}

/// Downloader that GETs the document URL over HTTP
pub struct HttpDownloader {
    /// HTTP client for document transfers
    http_client: reqwest::Client,

    /// Where documents are staged
    staging: StagingArea,

    /// Timeouts, retry and validation settings
    config: DownloadConfig,
}

impl HttpDownloader {
    /// Create a downloader
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(staging: StagingArea, config: DownloadConfig, user_agent: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            staging,
            config,
        })
    }

    /// Fetch `url` into `destination` (via a `.part` sibling), with retries
    async fn fetch_to(&self, url: &str, destination: &Path) -> Result<u64> {
        self.staging.ensure_dir().await?;
        let partial = part_path(destination);

        let result = with_retry(&self.config.retry, || self.fetch_once(url, &partial)).await;

        match result {
            Ok(bytes) => {
                fs::rename(&partial, destination).await?;
                Ok(bytes)
            }
            Err(e) => {
                if let Err(rm) = fs::remove_file(&partial).await
                    && rm.kind() != std::io::ErrorKind::NotFound
                {
                    warn!(path = ?partial, error = %rm, "failed to remove partial download");
                }
                Err(e)
            }
        }
    }

    /// One transfer attempt; the body is streamed to disk chunk by chunk
    async fn fetch_once(&self, url: &str, partial: &Path) -> Result<u64> {
        debug!(url = %url, "requesting document");
        let mut response = self.http_client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = fs::File::create(partial).await?;
        let mut written: u64 = 0;
        let mut header_checked = !self.config.require_pdf;
        let mut header = Vec::with_capacity(PDF_MAGIC.len());

        while let Some(chunk) = response.chunk().await? {
            if !header_checked {
                let take = (PDF_MAGIC.len() - header.len()).min(chunk.len());
                header.extend_from_slice(&chunk[..take]);
                if header.len() == PDF_MAGIC.len() {
                    if header != PDF_MAGIC {
                        return Err(Error::InvalidDocument(format!(
                            "{url} did not return a PDF document"
                        )));
                    }
                    header_checked = true;
                }
            }
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        if !header_checked {
            return Err(Error::InvalidDocument(format!(
                "{url} returned {written} bytes, too short for a PDF document"
            )));
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl DocumentDownloader for HttpDownloader {
    async fn download(&self, issue: &IssueReference) -> bool {
        let destination = self.staging.issue_path(issue.number);
        info!(issue = %issue.number, url = %issue.url, "Downloading issue");

        match self.fetch_to(&issue.url, &destination).await {
            Ok(bytes) => {
                info!(issue = %issue.number, bytes, path = ?destination, "Issue downloaded");
                true
            }
            Err(e) => {
                warn!(issue = %issue.number, url = %issue.url, error = %e, "Error downloading issue");
                false
            }
        }
    }
}

/// Temporary path used while a download is in flight
fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}
