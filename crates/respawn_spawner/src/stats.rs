//! # Stats Board
//!
//! The one piece of spawner state readable from other threads. The
//! coordinator publishes a fresh snapshot on every maintenance pass; a
//! debug overlay or telemetry thread reads it whenever it likes.

use parking_lot::RwLock;
use respawn_core::PoolStats;
use std::sync::Arc;
use std::time::Duration;

/// One maintenance report.
#[derive(Clone, Debug, PartialEq)]
pub struct StatsSnapshot<K> {
    /// Coordinator time of the report.
    pub at: Duration,
    /// Reports published so far, this one included.
    pub sequence: u64,
    /// Pairs active at report time.
    pub active_pairs: usize,
    /// Per-pool populations: categories in config order, then the controller.
    pub pools: Vec<PoolStats<K>>,
}

impl<K> StatsSnapshot<K> {
    /// Instances handed out across every pool.
    #[must_use]
    pub fn total_in_use(&self) -> usize {
        self.pools.iter().map(PoolStats::in_use).sum()
    }

    /// Instances owned across every pool.
    #[must_use]
    pub fn total_instances(&self) -> usize {
        self.pools.iter().map(|stats| stats.total).sum()
    }
}

impl<K> Default for StatsSnapshot<K> {
    fn default() -> Self {
        Self {
            at: Duration::ZERO,
            sequence: 0,
            active_pairs: 0,
            pools: Vec::new(),
        }
    }
}

/// Cloneable handle to the latest [`StatsSnapshot`].
#[derive(Debug)]
pub struct StatsBoard<K> {
    latest: Arc<RwLock<StatsSnapshot<K>>>,
}

impl<K> Clone for StatsBoard<K> {
    fn clone(&self) -> Self {
        Self {
            latest: Arc::clone(&self.latest),
        }
    }
}

impl<K: Clone> StatsBoard<K> {
    /// Creates a board holding an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            latest: Arc::new(RwLock::new(StatsSnapshot::default())),
        }
    }

    /// Replaces the snapshot, stamping the next sequence number.
    pub fn publish(&self, at: Duration, active_pairs: usize, pools: Vec<PoolStats<K>>) {
        let mut latest = self.latest.write();
        latest.sequence += 1;
        latest.at = at;
        latest.active_pairs = active_pairs;
        latest.pools = pools;
    }

    /// Copy of the latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot<K> {
        self.latest.read().clone()
    }

    /// Reads the latest snapshot in place.
    pub fn read<R>(&self, f: impl FnOnce(&StatsSnapshot<K>) -> R) -> R {
        f(&self.latest.read())
    }
}

impl<K: Clone> Default for StatsBoard<K> {
    fn default() -> Self {
        Self::new()
    }
}
