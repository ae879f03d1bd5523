//! Download staging area
//!
//! The staging directory holds at most one current document, named
//! `issue {N}.pdf`, plus a reserved placeholder entry that is never deleted.
//! Before a newly detected issue is fetched the directory is purged, so a
//! crash between purge and download leaves zero documents rather than two.

use crate::config::StorageConfig;
use crate::types::IssueNumber;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Deterministic document file name for an issue
pub fn issue_file_name(number: IssueNumber) -> String {
    format!("issue {number}.pdf")
}

/// Counts from a best-effort purge
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Files removed
    pub deleted: usize,
    /// Files that could not be removed (each logged)
    pub failed: usize,
}

/// Staging directory for downloaded documents
#[derive(Clone, Debug)]
pub struct StagingArea {
    dir: PathBuf,
    placeholder: String,
}

impl StagingArea {
    /// Create a staging area rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>, placeholder: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            placeholder: placeholder.into(),
        }
    }

    /// Create a staging area from storage settings
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.staging_dir, &config.placeholder_name)
    }

    /// Staging directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the document for `number` is (or will be) staged
    pub fn issue_path(&self, number: IssueNumber) -> PathBuf {
        self.dir.join(issue_file_name(number))
    }

    /// Whether the document for `number` is already staged
    pub async fn contains(&self, number: IssueNumber) -> bool {
        fs::metadata(self.issue_path(number))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Create the staging directory if needed
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir).await
    }

    /// Delete every file except the placeholder
    ///
    /// Errors are logged as warnings and counted but never abort the purge;
    /// a missing staging directory is an empty purge.
    pub async fn purge(&self) -> PurgeReport {
        self.purge_except(None).await
    }

    /// Delete every file except the placeholder and the document for `current`
    ///
    /// Used when `current` has just been detected: older issues and partial
    /// downloads go, while a finished download of `current` from an earlier
    /// cycle survives for the existence check.
    pub async fn purge_stale(&self, current: IssueNumber) -> PurgeReport {
        let keep = issue_file_name(current);
        self.purge_except(Some(&keep)).await
    }

    async fn purge_except(&self, keep: Option<&str>) -> PurgeReport {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = ?self.dir, "staging directory does not exist, nothing to purge");
                return PurgeReport::default();
            }
            Err(e) => {
                warn!(dir = ?self.dir, error = %e, "failed to read staging directory");
                return PurgeReport {
                    deleted: 0,
                    failed: 1,
                };
            }
        };

        let mut targets = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let file_name = entry.file_name();
                    if let Some(name) = file_name.to_str()
                        && (name == self.placeholder || Some(name) == keep)
                    {
                        continue;
                    }
                    match entry.file_type().await {
                        Ok(ft) if ft.is_dir() => {
                            debug!(path = ?entry.path(), "skipping directory in staging area");
                        }
                        _ => targets.push(entry.path()),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = ?self.dir, error = %e, "failed to list staging directory entry");
                    break;
                }
            }
        }

        let report = remove_files(&targets).await;
        if report.deleted > 0 || report.failed > 0 {
            info!(
                deleted = report.deleted,
                failed = report.failed,
                "purged staging directory"
            );
        }
        report
    }
}

/// Remove each file independently; one failure does not stop the rest
async fn remove_files(paths: &[PathBuf]) -> PurgeReport {
    let mut report = PurgeReport::default();
    for path in paths {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!(?path, "deleted old file");
                report.deleted += 1;
            }
            Err(e) => {
                warn!(?path, error = %e, "failed to delete file");
                report.failed += 1;
            }
        }
    }
    report
}
