//! Error types for issue-dl
//!
//! This module provides the error taxonomy of the library:
//! - [`ResolutionError`] - no strategy produced a usable issue number
//! - [`CacheError`] - the single-slot cache could not be read or written
//! - [`Error`] - crate-wide error wrapping the above plus I/O, network and config failures
//!
//! Download failures are deliberately absent: the download collaborator reports
//! failure as `false`, and the coordinator turns every error into a
//! [`CycleOutcome`](crate::types::CycleOutcome) rather than propagating it.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for issue-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for issue-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "resolver.primary_page_url")
        key: Option<String>,
    },

    /// Latest issue could not be resolved
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Cache read or write failed
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Requested URL
        url: String,
        /// Response status code
        status: u16,
    },

    /// Downloaded body is not the expected document type
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML configuration could not be parsed
    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Failure to determine the latest published issue
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The page could not be fetched at all (DNS, connect, timeout, body read)
    #[error("could not fetch {url}: {reason}")]
    Unreachable {
        /// Page URL
        url: String,
        /// Underlying transport error
        reason: String,
    },

    /// The page answered with a non-success HTTP status
    #[error("{url} returned HTTP {status}")]
    HttpStatus {
        /// Page URL
        url: String,
        /// Response status code
        status: u16,
    },

    /// The directory listing was reachable but contained no issue numbers
    #[error("No issue numbers found")]
    NoIssueNumbers,
}

/// Errors raised by the single-slot issue cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem operation on a cache path failed
    #[error("cache I/O on {path}: {source}")]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// metadata.json could not be encoded or decoded
    #[error("cache metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    /// The file to cache (or the cached file) does not exist
    #[error("file not found: {0}")]
    MissingFile(PathBuf),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}
