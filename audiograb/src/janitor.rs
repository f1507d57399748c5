//! Background eviction of stale artifacts.
//!
//! The janitor shares nothing with the request handlers except the directory
//! itself, so a sweep never takes a lock; handlers that lose a race against
//! it simply see `NotFound`.

use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::error::Error;
use crate::store::ArtifactStore;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries listed in the store.
    pub scanned: usize,
    pub evicted: usize,
    /// Entries that could not be inspected or removed.
    pub failed: usize,
}

/// Periodic sweeper deleting artifacts older than the retention window.
#[derive(Debug, Clone)]
pub struct Janitor {
    store: ArtifactStore,
    retention: Duration,
    interval: Duration,
}

impl Janitor {
    pub fn new(store: ArtifactStore, retention: Duration, interval: Duration) -> Self {
        Self {
            store,
            retention,
            interval,
        }
    }

    pub fn from_config(store: ArtifactStore, config: &ServiceConfig) -> Self {
        Self::new(store, config.retention, config.sweep_interval)
    }

    /// Run one full pass over the store, relative to the current time.
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now()).await
    }

    /// Run one full pass, treating `now` as the current time.
    ///
    /// Every error is logged and counted; none of them stops the pass.
    pub async fn sweep_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        let entries = match self.store.scan().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %self.store.root().display(), error = %e, "janitor could not list store");
                report.failed += 1;
                return report;
            }
        };
        report.scanned = entries.len();

        for (name, found) in entries {
            let artifact = match found {
                Ok(artifact) => artifact,
                // Directories, or files removed since the listing.
                Err(Error::NotFound { .. }) => continue,
                Err(e) => {
                    warn!(%name, error = %e, "janitor could not stat artifact");
                    report.failed += 1;
                    continue;
                }
            };

            // Timestamps in the future count as fresh.
            let Ok(age) = now.duration_since(artifact.last_modified) else {
                continue;
            };
            if age <= self.retention {
                continue;
            }

            match self.store.remove(&artifact).await {
                Ok(()) => {
                    info!(%name, age_secs = age.as_secs(), "evicted stale artifact");
                    report.evicted += 1;
                }
                Err(Error::NotFound { .. }) => {}
                Err(e) => {
                    warn!(%name, error = %e, "janitor could not delete artifact");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Sweep immediately, then once per interval, until `shutdown` flips to
    /// `true` or its sender is dropped.
    ///
    /// Shutdown interrupts a sweep in progress; the remaining entries are
    /// simply left for the next process.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            retention_secs = self.retention.as_secs(),
            interval_secs = self.interval.as_secs(),
            "janitor started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            tokio::select! {
                report = self.sweep() => {
                    if report.evicted > 0 || report.failed > 0 {
                        info!(scanned = report.scanned, evicted = report.evicted, failed = report.failed, "sweep finished");
                    } else {
                        debug!(scanned = report.scanned, "sweep finished");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("shutdown during sweep");
                        break;
                    }
                }
            }
        }

        info!("janitor stopped");
    }

    /// Spawn [`Janitor::run`] on the current runtime.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
