//! Holds the most recent completed snapshot
//!
//! Single writer (the cycle that just finished), any number of readers. The
//! stored value is an `Arc<Snapshot>` replaced as a whole, so a reader either
//! gets the previous cycle or the new one and never a mix of both. Readers
//! only hold the lock long enough to clone the `Arc`.
//!
//! Cycles may finish out of start order when scrapes overlap in on-demand
//! mode. A snapshot from a cycle that started earlier than the stored one is
//! never published over it.

use std::sync::Arc;

use crate::models::Snapshot;
use crate::state::{load, new_swap, store_unless, Swap};

#[derive(Clone)]
pub struct SnapshotCache {
    current: Swap<Snapshot>,
}

impl SnapshotCache {
    /// Starts out empty until the first cycle completes
    pub fn new() -> Self {
        Self {
            current: new_swap(Snapshot::empty()),
        }
    }

    pub fn read(&self) -> Arc<Snapshot> {
        load(&self.current)
    }

    /// Publishes `snapshot` unless a later-started cycle is already stored.
    /// Returns `snapshot` shared in both cases.
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        store_unless(&self.current, snapshot, |current, new| current.sequence > new.sequence)
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}
