//! # issue-dl
//!
//! Keeps a local copy of the latest issue of a serial publication.
//!
//! The library discovers the latest issue number by scraping the publisher's
//! pages, compares it to what is cached, and downloads plus caches a new issue
//! at most once. Two schedules drive it: a weekly release slot and a periodic
//! update check.
//!
//! ## Design
//!
//! - **Idempotent cycles** - a cycle that finds nothing new touches nothing
//! - **Single slot** - the staging area and the cache each hold one issue
//! - **Never fatal** - every failure ends a cycle with a [`CycleOutcome`] and
//!   the next trigger tries again
//! - **Event-driven** - consumers subscribe to [`Event`]s instead of polling
//!
//! ## Quick Start
//!
//! ```no_run
//! use issue_dl::{Config, Service, run_until_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = Service::from_config(&Config::default())?;
//!
//!     let mut events = service.coordinator().subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     run_until_shutdown(service.start()?).await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Single-slot issue cache
pub mod cache;
/// Configuration types
pub mod config;
/// Acquisition cycle coordination
pub mod coordinator;
/// Document download collaborator
pub mod downloader;
/// Error types
pub mod error;
/// Latest-issue resolution
pub mod resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Weekly slot and update-check cadence
pub mod scheduler;
/// Trigger task execution
pub mod scheduler_task;
/// Service wiring and lifecycle
pub mod service;
/// Download staging area
pub mod staging;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use cache::{CacheMetadata, FsCache, IssueCache, Validation};
pub use config::Config;
pub use coordinator::{AcquisitionCoordinator, CoordinatorStatus, CycleRecord};
pub use downloader::{DocumentDownloader, HttpDownloader};
pub use error::{CacheError, Error, ResolutionError, Result};
pub use resolver::{IssueResolver, IssueSource, Resolution, Strategy, build_issue_url};
pub use scheduler::{HourlyCadence, Weekday, WeeklyPolicy, WeeklySlot};
pub use service::{Service, ServiceHandle};
pub use staging::{PurgeReport, StagingArea};
pub use types::{
    CycleOutcome, DownloadState, Event, IssueNumber, IssueReference, Trigger, UpdateCheck,
};

/// Run the service until a termination signal arrives, then stop it.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use issue_dl::{Config, Service, run_until_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = Service::from_config(&Config::default())?;
///     run_until_shutdown(service.start()?).await;
///     Ok(())
/// }
/// ```
pub async fn run_until_shutdown(handle: ServiceHandle) {
    let token = handle.shutdown_token();
    tokio::select! {
        _ = wait_for_signal() => {}
        _ = token.cancelled() => {}
    }
    handle.shutdown().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Received Ctrl+C signal");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
