//! Periodic zone refresher.
//!
//! Refreshes every zone on a fixed interval so readers normally hit a fresh
//! cache entry. Zones are refreshed one after another with the configured
//! stagger; a failing zone is logged and keeps its previous value.

use breathe::service::ZoneRefreshOutcome;
use breathe::ZoneService;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Background refresher for all registered zones
pub struct RefreshScheduler {
    service: Arc<ZoneService>,
    interval: Duration,
    /// Status tracking
    status: Arc<tokio::sync::Mutex<RefreshStatus>>,
}

/// Status information for the refresher
#[derive(Clone, Debug, Default)]
pub struct RefreshStatus {
    /// Completion time of the last cycle
    pub last_cycle: Option<DateTime<Utc>>,
    /// Total number of completed cycles
    pub cycle_count: u64,
    /// Zones that failed during the last cycle
    pub last_failed_zones: Vec<String>,
}

impl RefreshScheduler {
    /// Intervals shorter than one second are raised to one second
    pub fn new(service: Arc<ZoneService>, interval: Duration) -> Self {
        Self {
            service,
            interval: interval.max(Duration::from_secs(1)),
            status: Arc::new(tokio::sync::Mutex::new(RefreshStatus::default())),
        }
    }

    /// Returns a clone of the status tracker for external monitoring.
    pub fn status(&self) -> Arc<tokio::sync::Mutex<RefreshStatus>> {
        Arc::clone(&self.status)
    }

    /// Refresh every zone once and record the outcome
    pub async fn run_cycle(&self) -> Vec<ZoneRefreshOutcome> {
        let outcomes = self.service.refresh_all().await;

        let mut failed = Vec::new();
        for outcome in &outcomes {
            match &outcome.result {
                Ok(cached) => debug!(
                    zone_id = %outcome.zone_id,
                    aqi = cached.value.result.aqi,
                    "Zone refreshed"
                ),
                Err(e) => {
                    warn!(zone_id = %outcome.zone_id, error = %e, "Zone refresh failed");
                    failed.push(outcome.zone_id.clone());
                }
            }
        }

        if !outcomes.is_empty() && failed.len() == outcomes.len() {
            error!(zones = outcomes.len(), "Every zone failed to refresh");
        } else {
            info!(
                zones = outcomes.len(),
                failed = failed.len(),
                "Refresh cycle complete"
            );
        }

        let mut status = self.status.lock().await;
        status.last_cycle = Some(Utc::now());
        status.cycle_count += 1;
        status.last_failed_zones = failed;

        outcomes
    }

    /// Starts the refresh loop (non-blocking).
    ///
    /// The first cycle runs immediately. Returns a JoinHandle that can be
    /// used for shutdown.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                zones = self.service.zones().count(),
                "Starting refresh scheduler"
            );

            let mut ticker = interval(self.interval);
            loop {
                ticker.tick().await;
                self.run_cycle().await;
            }
        })
    }
}
