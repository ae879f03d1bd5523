//! Single-slot issue cache
//!
//! The cache holds exactly one document, the most recent issue, described by
//! `metadata.json`:
//!
//! ```json
//! { "issueNumber": 305, "fileName": "issue 305.pdf", "checksum": "9f86d0…", "cachedAt": "…" }
//! ```
//!
//! `metadata.issueNumber` is the single source of truth for what is cached.
//! The coordinator only talks to the [`IssueCache`] trait; [`FsCache`] is the
//! filesystem implementation.

use crate::config::StorageConfig;
use crate::error::CacheError;
use crate::staging::issue_file_name;
use crate::types::IssueNumber;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

/// Name of the metadata file inside the cache directory
pub const METADATA_FILE: &str = "metadata.json";

/// Leading bytes of every PDF document
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Description of the cached issue
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    /// Cached issue
    pub issue_number: IssueNumber,
    /// File name of the cached document, relative to the cache directory
    pub file_name: String,
    /// SHA-256 of the document, lowercase hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// When the document was stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
}

/// Storage for the most recent issue
#[async_trait]
pub trait IssueCache: Send + Sync {
    /// Whether `number` is the cached issue and its document is present
    async fn is_cached(&self, number: IssueNumber) -> bool;

    /// Current metadata, or `None` when nothing is cached
    async fn metadata(&self) -> Option<CacheMetadata>;

    /// Store the staged document at `source` as issue `number`, returning its final path
    async fn store(&self, source: &Path, number: IssueNumber) -> Result<PathBuf, CacheError>;
}

/// Outcome of validating the cached document against its metadata
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Validation {
    /// File present, PDF header present, checksum matches (or none recorded)
    Valid {
        /// Cached issue
        issue: IssueNumber,
        /// Cached document path
        path: PathBuf,
        /// File size in bytes
        size: u64,
        /// Computed SHA-256
        checksum: String,
        /// Whether metadata carried a checksum to compare against
        checksum_verified: bool,
    },
    /// No metadata, so nothing to validate
    Empty,
    /// Metadata names a file that does not exist
    MissingFile(PathBuf),
    /// File does not start with `%PDF`
    NotPdf(PathBuf),
    /// File content differs from the recorded checksum
    ChecksumMismatch {
        /// Checksum in metadata.json
        expected: String,
        /// Checksum of the file on disk
        actual: String,
    },
}

impl Validation {
    /// Whether the cache passed validation
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid { .. })
    }
}

/// Filesystem-backed single-slot cache
#[derive(Clone, Debug)]
pub struct FsCache {
    dir: PathBuf,
}

impl FsCache {
    /// Create a cache rooted at `dir` (created lazily on first store)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create a cache from storage settings
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.cache_dir)
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Read metadata.json, distinguishing "absent" from "unreadable"
    pub async fn read_metadata(&self) -> Result<Option<CacheMetadata>, CacheError> {
        let path = self.metadata_path();
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Write metadata.json through a temporary file and rename
    async fn write_metadata(&self, metadata: &CacheMetadata) -> Result<(), CacheError> {
        let path = self.metadata_path();
        let tmp = self.dir.join(format!("{METADATA_FILE}.tmp"));
        let json = serde_json::to_vec_pretty(metadata)?;

        fs::write(&tmp, json)
            .await
            .map_err(|e| CacheError::io(&tmp, e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| CacheError::io(&path, e))
    }

    /// Check the cached document against its metadata
    pub async fn validate(&self) -> Result<Validation, CacheError> {
        let Some(metadata) = self.read_metadata().await? else {
            return Ok(Validation::Empty);
        };

        let path = self.dir.join(&metadata.file_name);
        let size = match fs::metadata(&path).await {
            Ok(m) if m.is_file() => m.len(),
            Ok(_) => return Ok(Validation::MissingFile(path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Validation::MissingFile(path));
            }
            Err(e) => return Err(CacheError::io(path, e)),
        };

        if !has_pdf_magic(&path).await? {
            return Ok(Validation::NotPdf(path));
        }

        let actual = sha256_file(&path).await?;
        if let Some(expected) = &metadata.checksum
            && !expected.eq_ignore_ascii_case(&actual)
        {
            return Ok(Validation::ChecksumMismatch {
                expected: expected.clone(),
                actual,
            });
        }

        Ok(Validation::Valid {
            issue: metadata.issue_number,
            path,
            size,
            checksum_verified: metadata.checksum.is_some(),
            checksum: actual,
        })
    }
}

#[async_trait]
impl IssueCache for FsCache {
    async fn is_cached(&self, number: IssueNumber) -> bool {
        match self.metadata().await {
            Some(metadata) if metadata.issue_number == number => {
                fs::metadata(self.dir.join(&metadata.file_name))
                    .await
                    .map(|m| m.is_file())
                    .unwrap_or(false)
            }
            _ => false,
        }
    }

    async fn metadata(&self) -> Option<CacheMetadata> {
        match self.read_metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(error = %e, "unreadable cache metadata, treating cache as empty");
                None
            }
        }
    }

    async fn store(&self, source: &Path, number: IssueNumber) -> Result<PathBuf, CacheError> {
        if !fs::try_exists(source)
            .await
            .map_err(|e| CacheError::io(source, e))?
        {
            return Err(CacheError::MissingFile(source.to_path_buf()));
        }

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?;

        let previous = self.metadata().await;
        let file_name = issue_file_name(number);
        let target = self.dir.join(&file_name);

        fs::copy(source, &target)
            .await
            .map_err(|e| CacheError::io(&target, e))?;
        let checksum = sha256_file(&target).await?;

        self.write_metadata(&CacheMetadata {
            issue_number: number,
            file_name: file_name.clone(),
            checksum: Some(checksum),
            cached_at: Some(Utc::now()),
        })
        .await?;

        // Single slot: drop the superseded document only once metadata points at the new one.
        if let Some(previous) = previous
            && previous.file_name != file_name
        {
            let old = self.dir.join(&previous.file_name);
            match fs::remove_file(&old).await {
                Ok(()) => debug!(path = ?old, "removed superseded cached document"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = ?old, error = %e, "failed to remove superseded document"),
            }
        }

        info!(issue = %number, path = ?target, "issue stored in cache");
        Ok(target)
    }
}

/// Whether the file starts with the PDF magic header
pub async fn has_pdf_magic(path: &Path) -> Result<bool, CacheError> {
    let mut file = fs::File::open(path)
        .await
        .map_err(|e| CacheError::io(path, e))?;
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let read = file
            .read(&mut header[filled..])
            .await
            .map_err(|e| CacheError::io(path, e))?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(header[..filled].starts_with(PDF_MAGIC) && filled == PDF_MAGIC.len())
}

/// SHA-256 of a file, lowercase hex
pub async fn sha256_file(path: &Path) -> Result<String, CacheError> {
    let mut file = fs::File::open(path)
        .await
        .map_err(|e| CacheError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let read = file
            .read(&mut buf)
            .await
            .map_err(|e| CacheError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
