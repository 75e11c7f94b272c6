use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, UNIX_EPOCH};

use crate::config::{CollectionMode, Config};
use crate::models::Snapshot;

/// Summary of the most recent completed cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle_id: String,
    /// Start order of the cycle
    pub sequence: u64,
    pub completed_at_unix: u64,
    pub duration_seconds: f64,
    pub observations: usize,
    pub collectors_down: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExporterHealth {
    pub uptime_seconds: u64,
    pub mode: CollectionMode,
    pub targets_configured: usize,
    pub cycles_completed: u64,
    pub last_cycle: Option<CycleSummary>,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    cycles: Arc<AtomicU64>,
    last_cycle: Arc<Mutex<Option<CycleSummary>>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: Arc::new(AtomicU64::new(0)),
            last_cycle: Arc::new(Mutex::new(None)),
        }
    }

    /// Counts the cycle. The summary only moves forward in start order, so a
    /// cycle finishing after a later-started one is counted but not shown.
    pub fn record_cycle(&self, snapshot: &Snapshot) {
        let summary = CycleSummary {
            cycle_id: snapshot.cycle_id.to_string(),
            sequence: snapshot.sequence,
            completed_at_unix: snapshot
                .completed_at
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            duration_seconds: snapshot.elapsed.as_secs_f64(),
            observations: snapshot.observations.len(),
            collectors_down: snapshot.outcomes.iter().filter(|o| !o.up).count(),
        };
        {
            let mut last = self.last_cycle.lock();
            if !matches!(&*last, Some(l) if l.sequence > summary.sequence) {
                *last = Some(summary);
            }
        }
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_health(&self, config: &Config) -> ExporterHealth {
        ExporterHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            mode: config.global.mode,
            targets_configured: config.targets.len(),
            cycles_completed: self.cycles.load(Ordering::Relaxed),
            last_cycle: self.last_cycle.lock().clone(),
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}
