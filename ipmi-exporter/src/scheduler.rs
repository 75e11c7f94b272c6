//! Decides when collection cycles run
//!
//! In cadence mode a background timer refreshes the cache and scrapes read
//! whatever is cached. In on-demand mode every scrape runs its own cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::SnapshotCache;
use crate::config::{CollectionMode, ConfigHandle};
use crate::health::HealthTracker;
use crate::models::Snapshot;
use crate::orchestrator::Orchestrator;

#[derive(Clone)]
pub struct Scheduler {
    mode: CollectionMode,
    orchestrator: Orchestrator,
    cache: SnapshotCache,
    config: ConfigHandle,
    health: HealthTracker,
    running: Arc<AtomicBool>,
}

/// Clears the "cycle running" flag however the cycle ends
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Scheduler {
    pub fn new(
        mode: CollectionMode,
        orchestrator: Orchestrator,
        cache: SnapshotCache,
        config: ConfigHandle,
        health: HealthTracker,
    ) -> Self {
        Self {
            mode,
            orchestrator,
            cache,
            config,
            health,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs one cycle and publishes it, unless one is already in flight
    pub async fn run_once(&self) -> Option<Arc<Snapshot>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("previous collection cycle still running, skipping");
            return None;
        }
        let _guard = RunningGuard(self.running.clone());
        Some(self.collect_and_publish().await)
    }

    async fn collect_and_publish(&self) -> Arc<Snapshot> {
        let snapshot = self.orchestrator.run_cycle(self.config.current()).await;
        self.health.record_cycle(&snapshot);
        self.cache.replace(snapshot)
    }

    /// Snapshot to answer a scrape with
    pub async fn snapshot_for_scrape(&self) -> Arc<Snapshot> {
        match self.mode {
            CollectionMode::Cadence => {
                let snapshot = self.cache.read();
                if snapshot.is_empty() {
                    debug!("no completed cycle yet, serving empty snapshot");
                }
                snapshot
            }
            CollectionMode::OnDemand => {
                debug!("scrape triggered collection");
                self.collect_and_publish().await
            }
        }
    }

    /// Starts the background timer; the first cycle runs immediately
    pub fn spawn_cadence(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut period = scheduler.config.current().global.interval();
            let mut ticker = cadence_timer(Instant::now(), period);
            info!(interval_secs = period.as_secs(), "cadence collection started");

            loop {
                ticker.tick().await;

                // cycles run detached so a slow one cannot delay the next tick
                let cycle = scheduler.clone();
                tokio::spawn(async move {
                    cycle.run_once().await;
                });

                let wanted = scheduler.config.current().global.interval();
                if wanted != period && !wanted.is_zero() {
                    info!(interval_secs = wanted.as_secs(), "collection interval changed");
                    period = wanted;
                    ticker = cadence_timer(Instant::now() + period, period);
                }
            }
        })
    }
}

fn cadence_timer(start: Instant, period: Duration) -> tokio::time::Interval {
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
