//! Acquisition coordinator
//!
//! One acquisition cycle answers, in order: is there a new issue, does the
//! staging area need cleaning, is the document already on disk, did caching
//! succeed. Each step's failure is caught where it happens and turned into a
//! [`CycleOutcome`]; nothing escapes a cycle.
//!
//! Cycles are serialized by a per-process mutex. Overlapping triggers (the
//! weekly slot and an update check firing together) therefore run one after
//! the other, and the second finds the cache current.

use crate::cache::{CacheMetadata, IssueCache};
use crate::downloader::DocumentDownloader;
use crate::resolver::{IssueSource, build_issue_url};
use crate::staging::StagingArea;
use crate::types::{
    CycleOutcome, DownloadState, Event, IssueNumber, IssueReference, Trigger, UpdateCheck,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, error, info, warn};

/// The last finished cycle
#[derive(Clone, Debug, Serialize)]
pub struct CycleRecord {
    /// What started the cycle
    pub trigger: Trigger,
    /// How it ended
    pub outcome: CycleOutcome,
    /// When it ended
    pub finished_at: DateTime<Utc>,
}

/// Snapshot for status queries
#[derive(Clone, Debug, Serialize)]
pub struct CoordinatorStatus {
    /// What the cache currently holds
    pub cached: Option<CacheMetadata>,
    /// Most recent cycle, if any ran in this process
    pub last_cycle: Option<CycleRecord>,
}

/// Drives resolve → compare → purge → download → cache transitions
pub struct AcquisitionCoordinator {
    source: Arc<dyn IssueSource>,
    downloader: Arc<dyn DocumentDownloader>,
    cache: Arc<dyn IssueCache>,
    staging: StagingArea,
    issue_base_url: String,
    cycle_lock: Mutex<()>,
    last_cycle: RwLock<Option<CycleRecord>>,
    event_tx: broadcast::Sender<Event>,
}

impl AcquisitionCoordinator {
    /// Create a coordinator over explicit collaborator handles
    ///
    /// `issue_base_url` is the template base for document URLs
    /// (`{issue_base_url}/issue_{n}`).
    pub fn new(
        source: Arc<dyn IssueSource>,
        downloader: Arc<dyn DocumentDownloader>,
        cache: Arc<dyn IssueCache>,
        staging: StagingArea,
        issue_base_url: impl Into<String>,
    ) -> Self {
        let (event_tx, _rx) = broadcast::channel(64);
        Self {
            source,
            downloader,
            cache,
            staging,
            issue_base_url: issue_base_url.into(),
            cycle_lock: Mutex::new(()),
            last_cycle: RwLock::new(None),
            event_tx,
        }
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Run one full acquisition cycle on request
    pub async fn run_acquisition_cycle(&self) -> CycleOutcome {
        self.run_cycle(Trigger::Manual).await
    }

    /// Run one full acquisition cycle, recording what started it
    pub async fn run_cycle(&self, trigger: Trigger) -> CycleOutcome {
        let _guard = self.cycle_lock.lock().await;

        info!(%trigger, "Starting acquisition cycle");
        self.emit(Event::CycleStarted { trigger });

        let outcome = self.acquire().await;

        if outcome.is_failure() {
            warn!(%trigger, outcome = outcome.label(), "Acquisition cycle failed: {}", outcome);
        } else {
            info!(%trigger, outcome = outcome.label(), "Acquisition cycle finished: {}", outcome);
        }

        let finished_at = Utc::now();
        *self.last_cycle.write().await = Some(CycleRecord {
            trigger,
            outcome: outcome.clone(),
            finished_at,
        });
        self.emit(Event::CycleFinished {
            trigger,
            outcome: outcome.clone(),
            at: finished_at,
        });

        outcome
    }

    /// Resolve and compare only; never purges, downloads or caches
    pub async fn check_for_update(&self) -> UpdateCheck {
        let latest = match self.source.resolve_latest_issue_number().await {
            Ok(resolution) => resolution.number,
            Err(e) => {
                warn!(error = %e, "Error checking for updates");
                return UpdateCheck::Failed {
                    error: e.to_string(),
                };
            }
        };
        let cached = self.cached_issue().await;

        if is_newer(latest, cached) {
            info!(%latest, cached = ?cached.map(|c| c.get()), "New issue detected");
            UpdateCheck::NewIssue { latest, cached }
        } else {
            info!(%latest, "Cache is up to date");
            UpdateCheck::UpToDate { latest, cached }
        }
    }

    /// Issue recorded in cache metadata, `None` when nothing is cached
    pub async fn cached_issue(&self) -> Option<IssueNumber> {
        self.cache.metadata().await.map(|m| m.issue_number)
    }

    /// Cache contents and the last cycle
    pub async fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            cached: self.cache.metadata().await,
            last_cycle: self.last_cycle.read().await.clone(),
        }
    }

    /// Most recent cycle outcome
    pub async fn last_outcome(&self) -> Option<CycleOutcome> {
        self.last_cycle
            .read()
            .await
            .as_ref()
            .map(|record| record.outcome.clone())
    }

    /// Issue reference for `number` under the configured base URL
    pub fn issue_reference(&self, number: IssueNumber) -> IssueReference {
        IssueReference {
            number,
            url: build_issue_url(&self.issue_base_url, number),
        }
    }

    async fn acquire(&self) -> CycleOutcome {
        let resolution = match self.source.resolve_latest_issue_number().await {
            Ok(resolution) => resolution,
            Err(e) => {
                error!(error = %e, "Error resolving latest issue");
                return CycleOutcome::ResolutionFailed {
                    error: e.to_string(),
                };
            }
        };
        let latest = resolution.number;
        let issue = self.issue_reference(latest);
        debug!(%latest, strategy = %resolution.strategy, url = %issue.url, "Latest issue resolved");

        let cached = self.cached_issue().await;
        if !is_newer(latest, cached) {
            info!(%latest, "Cache is up to date");
            return CycleOutcome::UpToDate { latest, cached };
        }

        let mut state = DownloadState::Unchecked;

        if self.cache.is_cached(latest).await {
            advance(&mut state, DownloadState::AlreadyCached, latest);
            info!(issue = %latest, "Issue is already in cache");
            return CycleOutcome::AlreadyCached { issue: latest };
        }

        info!(issue = %latest, cached = ?cached.map(|c| c.get()), "New issue detected, cleaning old downloads");
        self.emit(Event::NewIssueDetected { latest, cached });

        let purge = self.staging.purge_stale(latest).await;
        self.emit(Event::StagingPurged {
            deleted: purge.deleted,
            failed: purge.failed,
        });

        let staged_path = self.staging.issue_path(latest);
        let reused_staged_file = self.staging.contains(latest).await;

        if reused_staged_file {
            advance(&mut state, DownloadState::AlreadyDownloadedNotCached, latest);
            info!(issue = %latest, "Issue has already been downloaded previously");
        } else {
            advance(&mut state, DownloadState::NeedsDownload, latest);
            if !self.downloader.download(&issue).await {
                advance(&mut state, DownloadState::Failed, latest);
                return CycleOutcome::DownloadFailed { issue: latest };
            }
        }
        advance(&mut state, DownloadState::Downloaded, latest);
        self.emit(Event::Downloaded {
            issue: latest,
            path: staged_path.clone(),
        });

        match self.cache.store(&staged_path, latest).await {
            Ok(stored_path) => CycleOutcome::DownloadedAndCached {
                issue: latest,
                reused_staged_file,
                stored_path,
            },
            Err(e) => {
                warn!(issue = %latest, error = %e, "Error saving to cache, staged file kept for next cycle");
                CycleOutcome::CacheWriteFailed {
                    issue: latest,
                    error: e.to_string(),
                }
            }
        }
    }

    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

/// Whether `latest` is strictly newer than what is cached (nothing cached counts as zero)
fn is_newer(latest: IssueNumber, cached: Option<IssueNumber>) -> bool {
    cached.is_none_or(|cached| latest > cached)
}

fn advance(state: &mut DownloadState, next: DownloadState, issue: IssueNumber) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal download state transition {state:?} -> {next:?}"
    );
    debug!(%issue, from = ?*state, to = ?next, "download state");
    *state = next;
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
