//! Background trigger tasks
//!
//! Two tasks share one [`AcquisitionCoordinator`]:
//!
//! - [`WeeklyTrigger`] sleeps until the next weekly release slot, then runs a
//!   cycle (or, with [`WeeklyPolicy::WhenNewer`], checks first)
//! - [`UpdateCheckTrigger`] wakes on the hourly cadence, runs the cheap
//!   resolve-and-compare check and starts a cycle only for a newer issue
//!
//! Both compute the next fire time from local "now" on every iteration, so a
//! long cycle or a suspended host never causes a burst of catch-up runs.
//! Both exit promptly once their [`CancellationToken`] is cancelled.
//!
//! # Example
//!
//! ```no_run
//! use issue_dl::{Config, Service};
//! use issue_dl::scheduler_task::WeeklyTrigger;
//! use tokio_util::sync::CancellationToken;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let service = Service::from_config(&config)?;
//! let shutdown = CancellationToken::new();
//!
//! let weekly = WeeklyTrigger::new(
//!     service.coordinator(),
//!     config.schedule.weekly,
//!     config.schedule.weekly_policy,
//!     shutdown.clone(),
//! );
//! tokio::spawn(weekly.run());
//! # Ok(())
//! # }
//! ```

use crate::coordinator::AcquisitionCoordinator;
use crate::scheduler::{HourlyCadence, WeeklyPolicy, WeeklySlot};
use crate::types::{CycleOutcome, Trigger, UpdateCheck};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fallback wait when no next fire time can be computed
const RECOMPUTE_AFTER: Duration = Duration::from_secs(3600);

/// Runs an acquisition cycle at the weekly release slot
pub struct WeeklyTrigger {
    coordinator: Arc<AcquisitionCoordinator>,
    slot: WeeklySlot,
    policy: WeeklyPolicy,
    shutdown: CancellationToken,
}

impl WeeklyTrigger {
    /// Create the weekly trigger
    pub fn new(
        coordinator: Arc<AcquisitionCoordinator>,
        slot: WeeklySlot,
        policy: WeeklyPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            coordinator,
            slot,
            policy,
            shutdown,
        }
    }

    /// Loop until shutdown, firing at each weekly slot
    pub async fn run(self) {
        info!(day = ?self.slot.day, time = %self.slot.time, policy = ?self.policy, "Weekly trigger started");

        loop {
            let next = self.slot.next_after(&Local::now());
            if !wait_until(next, &self.shutdown).await {
                break;
            }
            if next.is_some() {
                self.fire().await;
            }
        }

        info!("Weekly trigger stopped");
    }

    /// One weekly firing; returns the cycle outcome if a cycle ran
    pub async fn fire(&self) -> Option<CycleOutcome> {
        info!("Running scheduled weekly issue check");
        match self.policy {
            WeeklyPolicy::Always => Some(self.coordinator.run_cycle(Trigger::Weekly).await),
            WeeklyPolicy::WhenNewer => match self.coordinator.check_for_update().await {
                UpdateCheck::NewIssue { .. } => {
                    Some(self.coordinator.run_cycle(Trigger::Weekly).await)
                }
                UpdateCheck::UpToDate { .. } | UpdateCheck::Failed { .. } => None,
            },
        }
    }
}

/// Runs the cheap update check on an hourly cadence
pub struct UpdateCheckTrigger {
    coordinator: Arc<AcquisitionCoordinator>,
    cadence: HourlyCadence,
    shutdown: CancellationToken,
}

impl UpdateCheckTrigger {
    /// Create the update-check trigger
    pub fn new(
        coordinator: Arc<AcquisitionCoordinator>,
        cadence: HourlyCadence,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            coordinator,
            cadence,
            shutdown,
        }
    }

    /// Loop until shutdown, checking at each aligned hour
    pub async fn run(self) {
        info!(every_hours = self.cadence.every_hours(), "Update check trigger started");

        loop {
            let next = self.cadence.next_after(&Local::now());
            if !wait_until(next, &self.shutdown).await {
                break;
            }
            if next.is_some() {
                self.fire().await;
            }
        }

        info!("Update check trigger stopped");
    }

    /// One check; a cycle runs only when a newer issue is reported
    ///
    /// A failed check is logged and swallowed; the next tick tries again.
    pub async fn fire(&self) -> Option<CycleOutcome> {
        debug!("Running scheduled update check");
        match self.coordinator.check_for_update().await {
            UpdateCheck::NewIssue { latest, cached } => {
                info!(%latest, cached = ?cached.map(|c| c.get()), "New issue detected, starting acquisition");
                Some(self.coordinator.run_cycle(Trigger::UpdateCheck).await)
            }
            UpdateCheck::UpToDate { .. } => None,
            UpdateCheck::Failed { error } => {
                warn!(%error, "Update check failed, will retry at next tick");
                None
            }
        }
    }
}

/// Sleep until `at` (or a fallback interval when `at` is unknown)
///
/// Returns `false` if shutdown was requested while waiting.
async fn wait_until(at: Option<DateTime<Local>>, shutdown: &CancellationToken) -> bool {
    let wait = match at {
        Some(at) => {
            debug!(next = %at, "Next trigger scheduled");
            (at - Local::now()).to_std().unwrap_or(Duration::ZERO)
        }
        None => {
            warn!("Could not compute next trigger time, retrying later");
            RECOMPUTE_AFTER
        }
    };

    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(wait) => true,
    }
}
