//! Configuration types for issue-dl
//!
//! Every field has a default, so an empty TOML file (or no file at all) yields
//! a working configuration pointed at the publication the tool was written for.

use crate::error::{Error, Result};
use crate::scheduler::{WeeklyPolicy, WeeklySlot};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where and how the latest issue number is discovered
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Publisher's "current issue" landing page (primary site)
    #[serde(default = "default_primary_page_url")]
    pub primary_page_url: String,

    /// Publisher's listing on the hosting platform (secondary site)
    #[serde(default = "default_directory_page_url")]
    pub directory_page_url: String,

    /// Base of issue document URLs; an issue lives at `{issue_base_url}/issue_{n}`
    #[serde(default = "default_issue_base_url")]
    pub issue_base_url: String,

    /// Marker preceding the document id in the hosting platform's embed URL
    #[serde(default = "default_embed_marker")]
    pub embed_marker: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent with page requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            primary_page_url: default_primary_page_url(),
            directory_page_url: default_directory_page_url(),
            issue_base_url: default_issue_base_url(),
            embed_marker: default_embed_marker(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// On-disk locations for staged downloads and the cache slot
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Staging directory holding at most one downloaded issue (default: "./downloads")
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Cache directory owning `metadata.json` and the cached document (default: "./cache")
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Reserved entry in the staging directory that purges never delete (default: ".gitkeep")
    #[serde(default = "default_placeholder_name")]
    pub placeholder_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            staging_dir: default_staging_dir(),
            cache_dir: default_cache_dir(),
            placeholder_name: default_placeholder_name(),
        }
    }
}

/// Retry configuration for transient download failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 2 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Document download behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Whole-request timeout for a document download (default: 10 minutes)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Reject bodies that do not start with the `%PDF` magic header (default: true)
    #[serde(default = "default_true")]
    pub require_pdf: bool,

    /// Retry settings for transient network failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout: default_download_timeout(),
            require_pdf: true,
            retry: RetryConfig::default(),
        }
    }
}

/// When acquisition cycles run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Weekly release slot (default: Wednesday 09:00 local time)
    #[serde(default)]
    pub weekly: WeeklySlot,

    /// What the weekly slot does when nothing new is published (default: always run)
    #[serde(default)]
    pub weekly_policy: WeeklyPolicy,

    /// Hours between update checks, aligned to midnight; must divide 24 (default: 6)
    #[serde(default = "default_check_every_hours")]
    pub check_every_hours: u32,

    /// Run one cycle as soon as the service starts (default: true)
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            weekly: WeeklySlot::default(),
            weekly_policy: WeeklyPolicy::default(),
            check_every_hours: default_check_every_hours(),
            run_on_startup: true,
        }
    }
}

/// Main configuration
///
/// Fields are organized into sub-configs:
/// - [`resolver`](ResolverConfig) - pages consulted for the latest issue
/// - [`storage`](StorageConfig) - staging and cache directories
/// - [`download`](DownloadConfig) - timeouts, retries, document checks
/// - [`schedule`](ScheduleConfig) - weekly slot and update-check cadence
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Issue resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Staging and cache locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Download settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Trigger schedules
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails [`Config::validate`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("resolver.primary_page_url", &self.resolver.primary_page_url),
            ("resolver.directory_page_url", &self.resolver.directory_page_url),
            ("resolver.issue_base_url", &self.resolver.issue_base_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::config(key, format!("invalid URL {value:?}: {e}")))?;
        }

        if self.resolver.embed_marker.trim().is_empty() {
            return Err(Error::config("resolver.embed_marker", "must not be empty"));
        }

        let hours = self.schedule.check_every_hours;
        if hours == 0 || 24 % hours != 0 {
            return Err(Error::config(
                "schedule.check_every_hours",
                format!("{hours} does not divide 24"),
            ));
        }

        if self.storage.placeholder_name.contains(['/', '\\']) {
            return Err(Error::config(
                "storage.placeholder_name",
                "must be a bare file name",
            ));
        }

        let multiplier = self.download.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(Error::config(
                "download.retry.backoff_multiplier",
                format!("{multiplier} must be a finite number of at least 1.0"),
            ));
        }

        for (key, timeout) in [
            ("resolver.request_timeout", self.resolver.request_timeout),
            ("download.timeout", self.download.timeout),
        ] {
            if timeout.is_zero() {
                return Err(Error::config(key, "must be at least 1 second"));
            }
        }

        Ok(())
    }
}

fn default_primary_page_url() -> String {
    "https://www.thebpview.com/current-issue.php".to_string()
}

fn default_directory_page_url() -> String {
    "https://issuu.com/thebpview".to_string()
}

fn default_issue_base_url() -> String {
    "https://issuu.com/thebpview/docs".to_string()
}

fn default_embed_marker() -> String {
    "e.issuu.com/embed.html?d=".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("issue-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_placeholder_name() -> String {
    ".gitkeep".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_check_every_hours() -> u32 {
    6
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
