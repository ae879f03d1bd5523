//! Service wiring
//!
//! [`Service`] builds the production collaborators from a [`Config`] and
//! shares one [`AcquisitionCoordinator`] between the trigger tasks.
//! [`Service::start`] spawns the triggers (plus an optional startup cycle) and
//! returns a [`ServiceHandle`] used to stop them.

use crate::cache::FsCache;
use crate::config::{Config, ScheduleConfig};
use crate::coordinator::AcquisitionCoordinator;
use crate::downloader::HttpDownloader;
use crate::error::{Error, Result};
use crate::resolver::IssueResolver;
use crate::scheduler::HourlyCadence;
use crate::scheduler_task::{UpdateCheckTrigger, WeeklyTrigger};
use crate::staging::StagingArea;
use crate::types::Trigger;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Production wiring of resolver, downloader, cache and staging area
pub struct Service {
    coordinator: Arc<AcquisitionCoordinator>,
    resolver: Arc<IssueResolver>,
    cache: FsCache,
    staging: StagingArea,
    schedule: ScheduleConfig,
}

impl Service {
    /// Build every collaborator from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an HTTP client
    /// cannot be created.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let staging = StagingArea::from_config(&config.storage);
        let cache = FsCache::from_config(&config.storage);
        let resolver = Arc::new(IssueResolver::new(config.resolver.clone())?);
        let downloader = Arc::new(HttpDownloader::new(
            staging.clone(),
            config.download.clone(),
            &config.resolver.user_agent,
        )?);

        let coordinator = Arc::new(AcquisitionCoordinator::new(
            resolver.clone(),
            downloader,
            Arc::new(cache.clone()),
            staging.clone(),
            config.resolver.issue_base_url.clone(),
        ));

        Ok(Self {
            coordinator,
            resolver,
            cache,
            staging,
            schedule: config.schedule.clone(),
        })
    }

    /// Shared coordinator
    pub fn coordinator(&self) -> Arc<AcquisitionCoordinator> {
        self.coordinator.clone()
    }

    /// Page resolver, for one-off lookups
    pub fn resolver(&self) -> &IssueResolver {
        &self.resolver
    }

    /// Filesystem cache
    pub fn cache(&self) -> &FsCache {
        &self.cache
    }

    /// Staging area
    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Spawn the trigger tasks
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the update-check cadence does not divide 24 hours.
    pub fn start(&self) -> Result<ServiceHandle> {
        let cadence = HourlyCadence::new(self.schedule.check_every_hours).ok_or_else(|| {
            Error::config(
                "schedule.check_every_hours",
                format!("{} does not divide 24", self.schedule.check_every_hours),
            )
        })?;

        let shutdown = CancellationToken::new();
        let mut tasks = Vec::with_capacity(3);

        tasks.push(tokio::spawn(
            WeeklyTrigger::new(
                self.coordinator.clone(),
                self.schedule.weekly,
                self.schedule.weekly_policy,
                shutdown.clone(),
            )
            .run(),
        ));
        tasks.push(tokio::spawn(
            UpdateCheckTrigger::new(self.coordinator.clone(), cadence, shutdown.clone()).run(),
        ));

        if self.schedule.run_on_startup {
            let coordinator = self.coordinator.clone();
            tasks.push(tokio::spawn(async move {
                coordinator.run_cycle(Trigger::Startup).await;
            }));
        }

        info!(
            weekly_day = ?self.schedule.weekly.day,
            weekly_time = %self.schedule.weekly.time,
            check_every_hours = cadence.every_hours(),
            run_on_startup = self.schedule.run_on_startup,
            "Issue service started"
        );

        Ok(ServiceHandle { shutdown, tasks })
    }
}

/// Running trigger tasks
pub struct ServiceHandle {
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ServiceHandle {
    /// Token that stops the triggers when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop the triggers and wait for them
    ///
    /// A cycle already in progress is allowed to finish.
    pub async fn shutdown(self) {
        info!("Shutting down issue service");
        self.shutdown.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "trigger task ended abnormally");
            }
        }
        info!("Issue service stopped");
    }
}
