//! Core types for issue-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::path::PathBuf;

/// Number identifying a published issue
///
/// Always positive. Zero and negative values are not issue numbers, so the only
/// ways to build one are [`IssueNumber::new`], [`FromStr`](std::str::FromStr)
/// and deserialization, all of which reject zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct IssueNumber(u32);

impl IssueNumber {
    /// Create an issue number, returning `None` for zero
    pub fn new(n: u32) -> Option<Self> {
        (n > 0).then_some(Self(n))
    }

    /// Get the inner value
    pub fn get(&self) -> u32 {
        self.0
    }

    /// Parse a captured digit run, treating empty, overflowing and zero values as no result
    pub fn parse_digits(digits: &str) -> Option<Self> {
        digits.parse::<u32>().ok().and_then(Self::new)
    }
}

impl TryFrom<u32> for IssueNumber {
    type Error = String;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        Self::new(n).ok_or_else(|| "issue number must be positive".to_string())
    }
}

impl From<IssueNumber> for u32 {
    fn from(n: IssueNumber) -> Self {
        n.0
    }
}

impl PartialEq<u32> for IssueNumber {
    fn eq(&self, other: &u32) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for IssueNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when parsing an [`IssueNumber`] from text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseIssueNumberError {
    /// Not a base-10 integer that fits in `u32`
    #[error("invalid issue number: {0}")]
    Invalid(#[from] ParseIntError),
    /// Parsed as zero
    #[error("issue number must be positive")]
    Zero,
}

impl std::str::FromStr for IssueNumber {
    type Err = ParseIssueNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: u32 = s.trim().parse()?;
        Self::new(n).ok_or(ParseIssueNumberError::Zero)
    }
}

/// An issue together with the URL it is published under
///
/// The URL is always derived from the number through
/// [`build_issue_url`](crate::resolver::build_issue_url); it is never stored on its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IssueReference {
    /// Issue number
    pub number: IssueNumber,
    /// Document URL on the hosting platform
    pub url: String,
}

/// Terminal result of one acquisition cycle
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum CycleOutcome {
    /// The cache already holds the latest issue (or a newer one)
    UpToDate {
        /// Issue reported by the resolver
        latest: IssueNumber,
        /// Issue recorded in the cache metadata
        cached: Option<IssueNumber>,
    },
    /// The cache reports the latest issue as stored even though metadata did not
    AlreadyCached {
        /// Issue found in the cache
        issue: IssueNumber,
    },
    /// A new issue was obtained and stored in the cache
    DownloadedAndCached {
        /// Issue that was stored
        issue: IssueNumber,
        /// Whether the download collaborator was skipped because the file was already staged
        reused_staged_file: bool,
        /// Final location reported by the cache
        stored_path: PathBuf,
    },
    /// The download collaborator reported failure
    DownloadFailed {
        /// Issue that could not be downloaded
        issue: IssueNumber,
    },
    /// The document was downloaded but could not be stored in the cache
    CacheWriteFailed {
        /// Issue whose file remains in the staging area
        issue: IssueNumber,
        /// Cache error message
        error: String,
    },
    /// No strategy produced a usable issue number
    ResolutionFailed {
        /// Resolution error message
        error: String,
    },
}

impl CycleOutcome {
    /// Short kebab-case label, stable for logs
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::UpToDate { .. } => "up-to-date",
            CycleOutcome::AlreadyCached { .. } => "already-cached",
            CycleOutcome::DownloadedAndCached { .. } => "downloaded-and-cached",
            CycleOutcome::DownloadFailed { .. } => "download-failed",
            CycleOutcome::CacheWriteFailed { .. } => "cache-write-failed",
            CycleOutcome::ResolutionFailed { .. } => "resolution-failed",
        }
    }

    /// Whether the cycle ended in one of the failure outcomes
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CycleOutcome::DownloadFailed { .. }
                | CycleOutcome::CacheWriteFailed { .. }
                | CycleOutcome::ResolutionFailed { .. }
        )
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::UpToDate { latest, cached } => match cached {
                Some(cached) => write!(f, "up-to-date (latest {latest}, cached {cached})"),
                None => write!(f, "up-to-date (latest {latest})"),
            },
            CycleOutcome::AlreadyCached { issue } => write!(f, "issue {issue} already cached"),
            CycleOutcome::DownloadedAndCached {
                issue, stored_path, ..
            } => write!(f, "issue {issue} cached at {}", stored_path.display()),
            CycleOutcome::DownloadFailed { issue } => write!(f, "download of issue {issue} failed"),
            CycleOutcome::CacheWriteFailed { issue, error } => {
                write!(f, "caching issue {issue} failed: {error}")
            }
            CycleOutcome::ResolutionFailed { error } => write!(f, "resolution failed: {error}"),
        }
    }
}

/// Per-cycle download progress; never persisted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownloadState {
    /// Nothing decided yet
    Unchecked,
    /// Cache already holds the issue
    AlreadyCached,
    /// File is staged from an earlier cycle but not cached
    AlreadyDownloadedNotCached,
    /// File must be fetched
    NeedsDownload,
    /// File is now staged
    Downloaded,
    /// Download collaborator reported failure
    Failed,
}

impl DownloadState {
    /// Whether moving from `self` to `next` is a legal step
    pub fn can_transition_to(self, next: DownloadState) -> bool {
        use DownloadState::*;
        matches!(
            (self, next),
            (Unchecked, AlreadyCached)
                | (Unchecked, AlreadyDownloadedNotCached)
                | (Unchecked, NeedsDownload)
                | (AlreadyDownloadedNotCached, Downloaded)
                | (NeedsDownload, Downloaded)
                | (NeedsDownload, Failed)
        )
    }
}

/// Result of the cheap resolve-and-compare check (no cleanup, no download)
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum UpdateCheck {
    /// The resolver reports a strictly newer issue than the cache holds
    NewIssue {
        /// Issue reported by the resolver
        latest: IssueNumber,
        /// Issue recorded in the cache metadata
        cached: Option<IssueNumber>,
    },
    /// Nothing newer is available
    UpToDate {
        /// Issue reported by the resolver
        latest: IssueNumber,
        /// Issue recorded in the cache metadata
        cached: Option<IssueNumber>,
    },
    /// Resolution failed
    Failed {
        /// Resolution error message
        error: String,
    },
}

/// What started an acquisition cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Weekly release-slot schedule
    Weekly,
    /// Periodic update check that found a newer issue
    UpdateCheck,
    /// One-off run at startup
    Startup,
    /// Explicit request (CLI or library caller)
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trigger::Weekly => "weekly",
            Trigger::UpdateCheck => "update_check",
            Trigger::Startup => "startup",
            Trigger::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// Lifecycle events broadcast by the coordinator
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A cycle started
    CycleStarted {
        /// What started the cycle
        trigger: Trigger,
    },
    /// The resolver found a newer issue than the cache holds
    NewIssueDetected {
        /// Newly detected issue
        latest: IssueNumber,
        /// Issue previously cached
        cached: Option<IssueNumber>,
    },
    /// The staging area was purged before fetching a new issue
    StagingPurged {
        /// Files removed
        deleted: usize,
        /// Files that could not be removed
        failed: usize,
    },
    /// The issue document is staged on disk
    Downloaded {
        /// Staged issue
        issue: IssueNumber,
        /// Staged file path
        path: PathBuf,
    },
    /// A cycle finished
    CycleFinished {
        /// What started the cycle
        trigger: Trigger,
        /// Terminal outcome
        outcome: CycleOutcome,
        /// Completion time
        at: DateTime<Utc>,
    },
}
