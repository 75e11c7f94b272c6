//! Value types flowing through a collection cycle
//!
//! Everything here is produced fresh per cycle and never mutated once built:
//! - `Target`: one managed BMC endpoint (from the configuration)
//! - `SensorReading` / `ScalarReading`: parsed tool output
//! - `MetricObservation`: classified, exportable sample
//! - `TargetOutcome`: per target, per sub-collector availability
//! - `Snapshot`: the complete result of one cycle

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::classifier::Family;

/// One remote management endpoint
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    pub host: String,
    pub user: String,
    pub pwd: String,
    /// Overrides `global.collectors` for this target only
    pub collectors: Option<Vec<String>>,
}

// Credentials stay out of logs.
impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("pwd", &"***")
            .field("collectors", &self.collectors)
            .finish()
    }
}

/// One row of `ipmimonitoring` output
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub id: i64,
    pub name: String,
    pub sensor_type: String,
    pub state: String,
    /// NaN when the tool reported `N/A`
    pub value: f64,
    pub unit: String,
    pub event: String,
}

/// What a `ScalarReading` measures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    PowerConsumption,
    ChassisPower,
    DriveFault,
    CoolingFault,
}

/// A single derived value pulled out of free-text tool output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarReading {
    pub kind: ScalarKind,
    pub value: f64,
}

/// A classified sample; `labels` follow the schema of `family` positionally
#[derive(Debug, Clone, PartialEq)]
pub struct MetricObservation {
    pub family: Family,
    pub labels: Vec<String>,
    pub value: f64,
}

impl MetricObservation {
    pub fn new(family: Family, labels: Vec<String>, value: f64) -> Self {
        debug_assert_eq!(
            labels.len(),
            family.spec().labels.len(),
            "label arity mismatch for {}",
            family.spec().name
        );
        Self { family, labels, value }
    }

    /// Value of the label called `name`, if the family declares it
    #[cfg(test)]
    pub fn label(&self, name: &str) -> Option<&str> {
        self.family
            .spec()
            .labels
            .iter()
            .position(|l| *l == name)
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }
}

/// Result of running one sub-collector against one target
#[derive(Debug, Clone, PartialEq)]
pub struct TargetOutcome {
    pub host: String,
    pub collector: String,
    pub up: bool,
    pub duration: Duration,
}

/// Everything one completed cycle produced; replaced as a whole
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub cycle_id: Uuid,
    /// Start order of the cycle; a later start has a larger value
    pub sequence: u64,
    pub completed_at: SystemTime,
    pub elapsed: Duration,
    pub target_count: usize,
    pub observations: Vec<MetricObservation>,
    pub outcomes: Vec<TargetOutcome>,
}

impl Snapshot {
    /// Placeholder served before the first cycle completes
    pub fn empty() -> Self {
        Self {
            cycle_id: Uuid::nil(),
            sequence: 0,
            completed_at: SystemTime::UNIX_EPOCH,
            elapsed: Duration::ZERO,
            target_count: 0,
            observations: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty() && self.outcomes.is_empty()
    }

    /// Number of samples this snapshot renders to
    pub fn sample_count(&self) -> usize {
        // each outcome renders as an `up` and a duration sample
        self.observations.len() + self.outcomes.len() * 2
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}
