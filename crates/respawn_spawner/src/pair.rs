//! # Spawn Pairs
//!
//! A pair is one controller instance with one actor attached under it.
//! Each spawn mints a fresh [`PairId`], so a timer armed for an old pair can
//! never act on a newer pair that happens to reuse the same controller slot.

use respawn_core::{InstanceId, PoolStats};
use std::fmt;
use std::time::Duration;

/// Identity of one spawn. Never reused within a coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairId(u64);

impl PairId {
    /// Wraps a raw pair number.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw pair number.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pair#{}", self.0)
    }
}

/// Why a pair left the active set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReturnReason {
    /// Its lifetime ran out.
    Expired,
    /// Gameplay despawned it.
    Manual,
    /// Swept by `force_return_all` or shutdown.
    Forced,
}

/// Handles returned by a successful spawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnedPair {
    /// The new pair.
    pub pair: PairId,
    /// Logic controller, positioned at the spawn point.
    pub controller: InstanceId,
    /// Visual actor, attached under the controller.
    pub actor: InstanceId,
}

/// Bookkeeping for a live pair.
#[derive(Clone, Debug, PartialEq)]
pub struct ActivePair<K, C> {
    /// Pair identity.
    pub pair: PairId,
    /// Controller handle.
    pub controller: InstanceId,
    /// Actor handle.
    pub actor: InstanceId,
    /// Category the actor was drawn from.
    pub category: C,
    /// Pool the actor came from.
    pub actor_key: K,
    /// Coordinator time at spawn.
    pub spawned_at: Duration,
}

/// Notification published by the coordinator.
#[derive(Clone, Debug, PartialEq)]
pub enum SpawnEvent<K, C> {
    /// Every pool finished prewarming. Sent once per initialization.
    PoolsReady,
    /// A pair was spawned.
    PairSpawned {
        /// Pair identity.
        pair: PairId,
        /// Category drawn from.
        category: C,
        /// Actor pool.
        actor_key: K,
        /// Controller handle.
        controller: InstanceId,
        /// Actor handle.
        actor: InstanceId,
    },
    /// A pair went back to its pools.
    PairReturned {
        /// Pair identity.
        pair: PairId,
        /// Why.
        reason: ReturnReason,
    },
    /// Periodic maintenance snapshot.
    StatsReport(Vec<PoolStats<K>>),
}
