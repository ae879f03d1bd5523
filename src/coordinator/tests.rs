use super::*;
use crate::error::{CacheError, ResolutionError};
use crate::resolver::{Resolution, Strategy};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const BASE_URL: &str = "https://issuu.com/thebpview/docs";

fn n(value: u32) -> IssueNumber {
    IssueNumber::new(value).unwrap()
}

/// Resolver that answers with a fixed number, or fails
struct ScriptedSource {
    latest: StdMutex<Option<u32>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn reporting(latest: u32) -> Arc<Self> {
        Arc::new(Self {
            latest: StdMutex::new(Some(latest)),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            latest: StdMutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    fn set(&self, latest: u32) {
        *self.latest.lock().unwrap() = Some(latest);
    }
}

#[async_trait]
impl IssueSource for ScriptedSource {
    async fn resolve_latest_issue_number(&self) -> Result<Resolution, ResolutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match *self.latest.lock().unwrap() {
            Some(latest) => Ok(Resolution {
                number: n(latest),
                strategy: Strategy::Embed,
            }),
            None => Err(ResolutionError::NoIssueNumbers),
        }
    }
}

/// Downloader that writes a small document into the staging area and counts calls
struct CountingDownloader {
    staging: StagingArea,
    succeed: bool,
    calls: AtomicUsize,
    urls: StdMutex<Vec<String>>,
}

impl CountingDownloader {
    fn new(staging: &StagingArea, succeed: bool) -> Arc<Self> {
        Arc::new(Self {
            staging: staging.clone(),
            succeed,
            calls: AtomicUsize::new(0),
            urls: StdMutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentDownloader for CountingDownloader {
    async fn download(&self, issue: &IssueReference) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(issue.url.clone());
        if !self.succeed {
            return false;
        }
        self.staging.ensure_dir().await.unwrap();
        tokio::fs::write(self.staging.issue_path(issue.number), b"%PDF-1.4 test")
            .await
            .unwrap();
        true
    }
}

/// In-memory cache; `is_cached` can be forced to disagree with metadata
struct MemoryCache {
    metadata: StdMutex<Option<CacheMetadata>>,
    forced_cached: StdMutex<Option<IssueNumber>>,
    fail_store: bool,
    stores: AtomicUsize,
}

impl MemoryCache {
    fn holding(issue: Option<u32>) -> Arc<Self> {
        Self::build(issue, false)
    }

    fn rejecting_writes(issue: Option<u32>) -> Arc<Self> {
        Self::build(issue, true)
    }

    fn build(issue: Option<u32>, fail_store: bool) -> Arc<Self> {
        Arc::new(Self {
            metadata: StdMutex::new(issue.map(|i| CacheMetadata {
                issue_number: n(i),
                file_name: format!("issue {i}.pdf"),
                checksum: None,
                cached_at: None,
            })),
            forced_cached: StdMutex::new(None),
            fail_store,
            stores: AtomicUsize::new(0),
        })
    }

    fn stores(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IssueCache for MemoryCache {
    async fn is_cached(&self, number: IssueNumber) -> bool {
        if *self.forced_cached.lock().unwrap() == Some(number) {
            return true;
        }
        self.metadata
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|m| m.issue_number == number)
    }

    async fn metadata(&self) -> Option<CacheMetadata> {
        self.metadata.lock().unwrap().clone()
    }

    async fn store(&self, source: &Path, number: IssueNumber) -> Result<PathBuf, CacheError> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        if self.fail_store {
            return Err(CacheError::io(
                source,
                std::io::Error::other("cache volume is read-only"),
            ));
        }
        if !source.exists() {
            return Err(CacheError::MissingFile(source.to_path_buf()));
        }
        let file_name = format!("issue {number}.pdf");
        *self.metadata.lock().unwrap() = Some(CacheMetadata {
            issue_number: number,
            file_name: file_name.clone(),
            checksum: None,
            cached_at: Some(Utc::now()),
        });
        Ok(PathBuf::from("/cache").join(file_name))
    }
}

struct Harness {
    _temp: TempDir,
    staging: StagingArea,
    source: Arc<ScriptedSource>,
    downloader: Arc<CountingDownloader>,
    cache: Arc<MemoryCache>,
    coordinator: AcquisitionCoordinator,
}

fn harness(source: Arc<ScriptedSource>, cache: Arc<MemoryCache>, download_ok: bool) -> Harness {
    let temp = TempDir::new().unwrap();
    let staging = StagingArea::new(temp.path().join("downloads"), ".gitkeep");
    std::fs::create_dir_all(staging.dir()).unwrap();
    std::fs::write(staging.dir().join(".gitkeep"), "").unwrap();

    let downloader = CountingDownloader::new(&staging, download_ok);
    let coordinator = AcquisitionCoordinator::new(
        source.clone(),
        downloader.clone(),
        cache.clone(),
        staging.clone(),
        BASE_URL,
    );
    Harness {
        _temp: temp,
        staging,
        source,
        downloader,
        cache,
        coordinator,
    }
}

#[tokio::test]
async fn test_new_issue_is_downloaded_and_cached() {
    let h = harness(ScriptedSource::reporting(305), MemoryCache::holding(Some(300)), true);
    std::fs::write(h.staging.dir().join("issue 300.pdf"), "old").unwrap();

    let outcome = h.coordinator.run_acquisition_cycle().await;

    assert_eq!(
        outcome,
        CycleOutcome::DownloadedAndCached {
            issue: n(305),
            reused_staged_file: false,
            stored_path: PathBuf::from("/cache/issue 305.pdf"),
        }
    );
    assert_eq!(h.downloader.calls(), 1);
    assert_eq!(
        h.downloader.urls.lock().unwrap().as_slice(),
        [format!("{BASE_URL}/issue_305")]
    );
    assert_eq!(h.cache.stores(), 1);
    assert!(!h.staging.dir().join("issue 300.pdf").exists());
    assert!(h.staging.dir().join(".gitkeep").exists());
    assert!(h.staging.contains(n(305)).await);
    assert_eq!(h.coordinator.cached_issue().await, Some(n(305)));
}

#[tokio::test]
async fn test_second_cycle_is_a_no_op() {
    let h = harness(ScriptedSource::reporting(305), MemoryCache::holding(Some(300)), true);

    h.coordinator.run_acquisition_cycle().await;
    let second = h.coordinator.run_acquisition_cycle().await;

    assert_eq!(
        second,
        CycleOutcome::UpToDate {
            latest: n(305),
            cached: Some(n(305)),
        }
    );
    assert_eq!(h.downloader.calls(), 1);
    assert_eq!(h.cache.stores(), 1);
}

#[tokio::test]
async fn test_older_or_equal_issue_touches_nothing() {
    let h = harness(ScriptedSource::reporting(299), MemoryCache::holding(Some(300)), true);
    std::fs::write(h.staging.dir().join("issue 300.pdf"), "kept").unwrap();

    let outcome = h.coordinator.run_acquisition_cycle().await;

    assert!(matches!(outcome, CycleOutcome::UpToDate { .. }));
    assert!(h.staging.dir().join("issue 300.pdf").exists());
    assert_eq!(h.downloader.calls(), 0);
    assert_eq!(h.cache.stores(), 0);
}

#[tokio::test]
async fn test_empty_cache_counts_as_zero() {
    let h = harness(ScriptedSource::reporting(1), MemoryCache::holding(None), true);

    let outcome = h.coordinator.run_acquisition_cycle().await;

    assert!(matches!(
        outcome,
        CycleOutcome::DownloadedAndCached { issue, .. } if issue == n(1)
    ));
}

#[tokio::test]
async fn test_staged_file_is_reused_without_download() {
    let h = harness(
        ScriptedSource::reporting(305),
        MemoryCache::rejecting_writes(Some(300)),
        true,
    );

    // First cycle downloads but cannot cache.
    let first = h.coordinator.run_acquisition_cycle().await;
    assert!(matches!(first, CycleOutcome::CacheWriteFailed { issue, .. } if issue == n(305)));
    assert!(h.staging.contains(n(305)).await, "staged file survives a cache failure");
    assert_eq!(h.downloader.calls(), 1);

    // Second cycle finds the staged file and goes straight to the cache.
    let second = h.coordinator.run_acquisition_cycle().await;
    assert!(matches!(second, CycleOutcome::CacheWriteFailed { .. }));
    assert_eq!(h.downloader.calls(), 1);
    assert_eq!(h.cache.stores(), 2);
}

#[tokio::test]
async fn test_reused_staged_file_is_reported() {
    let h = harness(ScriptedSource::reporting(305), MemoryCache::holding(Some(300)), true);
    std::fs::write(h.staging.issue_path(n(305)), "%PDF-1.4 earlier").unwrap();

    let outcome = h.coordinator.run_acquisition_cycle().await;

    assert!(matches!(
        outcome,
        CycleOutcome::DownloadedAndCached {
            reused_staged_file: true,
            ..
        }
    ));
    assert_eq!(h.downloader.calls(), 0);
    assert_eq!(h.cache.stores(), 1);
}

#[tokio::test]
async fn test_download_failure_skips_cache() {
    let h = harness(ScriptedSource::reporting(305), MemoryCache::holding(Some(300)), false);

    let outcome = h.coordinator.run_acquisition_cycle().await;

    assert_eq!(outcome, CycleOutcome::DownloadFailed { issue: n(305) });
    assert_eq!(h.cache.stores(), 0);
    assert_eq!(h.coordinator.cached_issue().await, Some(n(300)));
}

#[tokio::test]
async fn test_unpurgeable_staging_still_downloads() {
    let temp = TempDir::new().unwrap();
    // A plain file where the staging directory should be cannot be listed
    let staging = StagingArea::new(temp.path().join("downloads"), ".gitkeep");
    std::fs::write(staging.dir(), "not a directory").unwrap();
    let elsewhere = StagingArea::new(temp.path().join("elsewhere"), ".gitkeep");

    let downloader = CountingDownloader::new(&elsewhere, true);
    let cache = MemoryCache::holding(Some(300));
    let coordinator = AcquisitionCoordinator::new(
        ScriptedSource::reporting(305),
        downloader.clone(),
        cache.clone(),
        staging,
        BASE_URL,
    );
    let mut events = coordinator.subscribe();

    let outcome = coordinator.run_acquisition_cycle().await;

    assert_eq!(downloader.calls(), 1);
    assert!(elsewhere.contains(n(305)).await);
    assert!(matches!(outcome, CycleOutcome::CacheWriteFailed { issue, .. } if issue == n(305)));
    assert_eq!(cache.stores(), 1);

    let mut purges = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::StagingPurged { deleted, failed } = event {
            purges.push((deleted, failed));
        }
    }
    assert_eq!(purges, vec![(0, 1)]);
}

#[tokio::test]
async fn test_resolution_failure_touches_nothing() {
    let h = harness(ScriptedSource::failing(), MemoryCache::holding(Some(300)), true);
    std::fs::write(h.staging.dir().join("issue 300.pdf"), "kept").unwrap();

    let outcome = h.coordinator.run_acquisition_cycle().await;

    assert_eq!(
        outcome,
        CycleOutcome::ResolutionFailed {
            error: "No issue numbers found".to_string()
        }
    );
    assert!(h.staging.dir().join("issue 300.pdf").exists());
    assert_eq!(h.downloader.calls(), 0);
    assert_eq!(h.cache.stores(), 0);
}

#[tokio::test]
async fn test_cache_disagreeing_with_metadata_skips_purge() {
    let h = harness(ScriptedSource::reporting(305), MemoryCache::holding(Some(300)), true);
    *h.cache.forced_cached.lock().unwrap() = Some(n(305));
    std::fs::write(h.staging.dir().join("issue 300.pdf"), "kept").unwrap();

    let outcome = h.coordinator.run_acquisition_cycle().await;

    assert_eq!(outcome, CycleOutcome::AlreadyCached { issue: n(305) });
    assert!(h.staging.dir().join("issue 300.pdf").exists());
    assert_eq!(h.downloader.calls(), 0);
}

#[tokio::test]
async fn test_check_for_update_has_no_side_effects() {
    let h = harness(ScriptedSource::reporting(305), MemoryCache::holding(Some(300)), true);
    std::fs::write(h.staging.dir().join("issue 300.pdf"), "kept").unwrap();

    assert_eq!(
        h.coordinator.check_for_update().await,
        UpdateCheck::NewIssue {
            latest: n(305),
            cached: Some(n(300)),
        }
    );
    assert!(h.staging.dir().join("issue 300.pdf").exists());
    assert_eq!(h.downloader.calls(), 0);
    assert_eq!(h.coordinator.last_outcome().await, None);

    h.source.set(300);
    assert!(matches!(
        h.coordinator.check_for_update().await,
        UpdateCheck::UpToDate { .. }
    ));
}

#[tokio::test]
async fn test_check_for_update_reports_failure() {
    let h = harness(ScriptedSource::failing(), MemoryCache::holding(None), true);
    assert!(matches!(
        h.coordinator.check_for_update().await,
        UpdateCheck::Failed { .. }
    ));
}

#[tokio::test]
async fn test_events_follow_cycle_progress() {
    let h = harness(ScriptedSource::reporting(305), MemoryCache::holding(Some(300)), true);
    let mut events = h.coordinator.subscribe();

    h.coordinator.run_cycle(Trigger::Weekly).await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen[0], Event::CycleStarted { trigger: Trigger::Weekly }));
    assert!(matches!(seen[1], Event::NewIssueDetected { latest, .. } if latest == n(305)));
    assert!(matches!(seen[2], Event::StagingPurged { .. }));
    assert!(matches!(seen[3], Event::Downloaded { issue, .. } if issue == n(305)));
    assert!(matches!(
        seen[4],
        Event::CycleFinished {
            trigger: Trigger::Weekly,
            ..
        }
    ));
    assert_eq!(seen.len(), 5);
}

#[tokio::test]
async fn test_status_records_last_cycle() {
    let h = harness(ScriptedSource::reporting(305), MemoryCache::holding(Some(300)), true);

    assert!(h.coordinator.status().await.last_cycle.is_none());
    h.coordinator.run_cycle(Trigger::UpdateCheck).await;

    let status = h.coordinator.status().await;
    let record = status.last_cycle.unwrap();
    assert_eq!(record.trigger, Trigger::UpdateCheck);
    assert_eq!(record.outcome.label(), "downloaded-and-cached");
    assert_eq!(status.cached.unwrap().issue_number, n(305));
}

#[tokio::test]
async fn test_concurrent_cycles_download_once() {
    let h = harness(ScriptedSource::reporting(305), MemoryCache::holding(Some(300)), true);
    let coordinator = Arc::new(h.coordinator);

    let a = {
        let c = coordinator.clone();
        tokio::spawn(async move { c.run_cycle(Trigger::Weekly).await })
    };
    let b = {
        let c = coordinator.clone();
        tokio::spawn(async move { c.run_cycle(Trigger::UpdateCheck).await })
    };
    let outcomes = [a.await.unwrap(), b.await.unwrap()];

    assert_eq!(h.downloader.calls(), 1);
    assert_eq!(h.cache.stores(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, CycleOutcome::UpToDate { .. }))
            .count(),
        1
    );
    assert_eq!(h.source.calls.load(Ordering::SeqCst), 2);
}
