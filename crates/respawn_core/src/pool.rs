//! # Instance Pool
//!
//! Owns every instance of one prototype family and recycles them.
//!
//! ## Lifecycle
//!
//! ```text
//! Uncreated → Available → InUse → Available → … → Destroyed (clear only)
//! ```
//!
//! Bulk creation (prewarm, expansion) never happens all at once: it is a
//! resumable job that creates at most `creation_batch` instances per call to
//! [`Pool::resume_creation`]. The registry calls it once per scheduler tick.

use crossbeam_channel::{Receiver, Sender};
use respawn_shared::{DEFAULT_CREATION_BATCH, DEFAULT_INITIAL_SIZE, DEFAULT_MAX_SIZE};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::{PoolError, PoolResult};
use crate::event::{EventBus, LifecycleEvent};
use crate::instance::{InstanceId, InstanceState, Poolable, Pooled};
use crate::prototype::{PoolKey, Prototype};
use crate::schedule::CancellationToken;

/// Source of pool epochs. Every initialization takes a fresh one.
static NEXT_EPOCH: AtomicU32 = AtomicU32::new(1);

fn next_epoch() -> u32 {
    NEXT_EPOCH.fetch_add(1, Ordering::Relaxed)
}

/// Sizing and growth policy of a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Instances created by prewarm.
    pub initial_size: usize,
    /// Hard cap on instances the pool may ever own at once.
    pub max_size: usize,
    /// Whether `get()` may create instances on demand.
    pub allow_growth: bool,
    /// Instances created per scheduler tick during prewarm/expansion.
    pub creation_batch: usize,
}

impl PoolConfig {
    /// Creates a config with the default creation batch.
    #[must_use]
    pub const fn new(initial_size: usize, max_size: usize, allow_growth: bool) -> Self {
        Self {
            initial_size,
            max_size,
            allow_growth,
            creation_batch: DEFAULT_CREATION_BATCH,
        }
    }

    /// Overrides the number of instances created per tick.
    #[must_use]
    pub fn with_creation_batch(mut self, creation_batch: usize) -> Self {
        self.creation_batch = creation_batch;
        self
    }

    /// Checks the config for values a pool cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_size == 0 {
            return Err(PoolError::InvalidConfig("max_size must be at least 1".into()));
        }
        if self.max_size > u32::MAX as usize {
            return Err(PoolError::InvalidConfig(format!(
                "max_size {} exceeds the addressable slot range",
                self.max_size
            )));
        }
        if self.initial_size > self.max_size {
            return Err(PoolError::InvalidConfig(format!(
                "initial_size {} exceeds max_size {}",
                self.initial_size, self.max_size
            )));
        }
        if self.creation_batch == 0 {
            return Err(PoolError::InvalidConfig(
                "creation_batch must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_SIZE, DEFAULT_MAX_SIZE, true)
    }
}

/// Readiness of a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PoolStatus {
    /// Never initialized, or cleared since.
    Uninitialized,
    /// Initialized, prewarm still creating instances.
    Prewarming,
    /// Fully usable.
    Ready,
}

/// Read-only snapshot of a pool's population.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolStats<K> {
    /// The pool key.
    pub key: K,
    /// Instances waiting in the available queue.
    pub available: usize,
    /// Instances the pool owns.
    pub total: usize,
    /// The pool's hard cap.
    pub max_size: usize,
    /// Whether prewarm has completed.
    pub prewarmed: bool,
    /// Readiness at snapshot time.
    pub status: PoolStatus,
}

impl<K> PoolStats<K> {
    /// Instances currently handed out.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.total.saturating_sub(self.available)
    }
}

/// Outcome of one [`Pool::resume_creation`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreationProgress {
    /// No creation job was pending.
    Idle,
    /// A batch was created; more remain for the next tick.
    Pending,
    /// The job finished.
    Complete,
    /// The job was invalidated (pool cleared or token cancelled).
    Aborted,
}

impl CreationProgress {
    /// Returns true if the job needs another tick.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }
}

#[derive(Clone, Copy, Debug)]
struct CreationJob {
    /// Total population the job stops at.
    target: usize,
    /// Whether finishing marks the pool prewarmed.
    prewarm: bool,
}

struct Slot<T> {
    node: Pooled<T>,
    state: InstanceState,
}

/// Pool of interchangeable instances stamped from one prototype.
pub struct Pool<K, T> {
    key: K,
    prototype: Option<Arc<dyn Prototype<K, T>>>,
    config: PoolConfig,
    epoch: u32,
    slots: Vec<Slot<T>>,
    available: VecDeque<u32>,
    initialized: bool,
    prewarmed: bool,
    creation: Option<CreationJob>,
    token: CancellationToken,
    events: EventBus<LifecycleEvent<K>>,
}

impl<K: PoolKey, T: Poolable> Pool<K, T> {
    /// Creates an empty, uninitialized pool for `key`.
    #[must_use]
    pub fn new(key: K) -> Self {
        Self {
            key,
            prototype: None,
            config: PoolConfig::default(),
            epoch: 0,
            slots: Vec::new(),
            available: VecDeque::new(),
            initialized: false,
            prewarmed: false,
            creation: None,
            token: CancellationToken::new(),
            events: EventBus::new(),
        }
    }

    /// The pool key.
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The active configuration.
    #[inline]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Epoch stamped into every handle this population hands out.
    #[inline]
    #[must_use]
    pub const fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Token cancelled when this population is cleared.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Subscribes to this pool's lifecycle events.
    pub fn subscribe(&mut self) -> Receiver<LifecycleEvent<K>> {
        self.events.subscribe()
    }

    /// Forwards this pool's lifecycle events into an existing channel.
    pub fn add_sink(&mut self, sink: Sender<LifecycleEvent<K>>) {
        self.events.add_sink(sink);
    }

    /// Records configuration and starts prewarm.
    ///
    /// The prewarm itself is chunked; drive it with
    /// [`Pool::resume_creation`] (the registry does this every tick).
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] or
    /// [`PoolError::PrototypeMismatch`]; the pool then stays uninitialized.
    pub fn initialize(
        &mut self,
        prototype: Arc<dyn Prototype<K, T>>,
        config: PoolConfig,
    ) -> PoolResult<()> {
        self.configure(prototype, config)?;
        self.prewarm();
        Ok(())
    }

    /// Records configuration without prewarming.
    ///
    /// The pool is ready immediately with no instances and grows on demand
    /// (if growth is allowed).
    ///
    /// # Errors
    ///
    /// Same as [`Pool::initialize`].
    pub fn configure(
        &mut self,
        prototype: Arc<dyn Prototype<K, T>>,
        config: PoolConfig,
    ) -> PoolResult<()> {
        if let Err(err) = self.check(prototype.as_ref(), &config) {
            tracing::error!(pool = ?self.key, %err, "pool initialization failed");
            return Err(err);
        }

        if self.initialized || !self.slots.is_empty() {
            tracing::warn!(pool = ?self.key, "re-initializing a live pool, clearing it first");
            self.clear();
        }

        self.prototype = Some(prototype);
        self.config = config;
        self.epoch = next_epoch();
        self.token = CancellationToken::new();
        self.initialized = true;
        self.prewarmed = false;

        tracing::debug!(
            pool = ?self.key,
            initial = config.initial_size,
            max = config.max_size,
            growth = config.allow_growth,
            "pool configured"
        );
        Ok(())
    }

    fn check(&self, prototype: &dyn Prototype<K, T>, config: &PoolConfig) -> PoolResult<()> {
        config.validate()?;
        let proto_key = prototype.key();
        if proto_key != self.key {
            return Err(PoolError::PrototypeMismatch {
                pool: format!("{:?}", self.key),
                prototype: format!("{proto_key:?}"),
            });
        }
        Ok(())
    }

    /// Schedules `initial_size` more creations and returns how many are planned.
    ///
    /// Calling this twice doubles the population (up to `max_size`).
    pub fn prewarm(&mut self) -> usize {
        if !self.initialized {
            tracing::warn!(pool = ?self.key, "prewarm requested on uninitialized pool");
            return 0;
        }
        let target = (self.planned_total() + self.config.initial_size).min(self.config.max_size);
        self.creation = Some(CreationJob {
            target,
            prewarm: true,
        });
        target.saturating_sub(self.slots.len())
    }

    /// Schedules up to `additional` more creations, capped at `max_size`.
    ///
    /// Not gated by `allow_growth`. Returns how many creations were added
    /// to the plan.
    pub fn expand_pool(&mut self, additional: usize) -> usize {
        if !self.initialized {
            tracing::warn!(pool = ?self.key, "expand requested on uninitialized pool");
            return 0;
        }
        let planned = self.planned_total();
        let target = (planned + additional).min(self.config.max_size);
        if target <= planned {
            tracing::debug!(pool = ?self.key, max = self.config.max_size, "pool already at max, not expanding");
            return 0;
        }
        let prewarm = self.creation.is_some_and(|job| job.prewarm);
        self.creation = Some(CreationJob { target, prewarm });
        tracing::info!(pool = ?self.key, added = target - planned, target, "expanding pool");
        target - planned
    }

    fn planned_total(&self) -> usize {
        self.creation
            .map_or(self.slots.len(), |job| job.target.max(self.slots.len()))
    }

    /// Runs one batch of the pending creation job.
    pub fn resume_creation(&mut self) -> CreationProgress {
        let Some(job) = self.creation else {
            return CreationProgress::Idle;
        };
        if !self.initialized || self.token.is_cancelled() {
            self.creation = None;
            return CreationProgress::Aborted;
        }

        let mut created = 0;
        while created < self.config.creation_batch && self.slots.len() < job.target {
            if self.create_instance().is_none() {
                break;
            }
            created += 1;
        }

        if self.slots.len() < job.target {
            tracing::trace!(pool = ?self.key, created, total = self.slots.len(), target = job.target, "creation batch done");
            return CreationProgress::Pending;
        }

        self.creation = None;
        if job.prewarm && !self.prewarmed {
            self.prewarmed = true;
            tracing::info!(pool = ?self.key, total = self.slots.len(), "pool prewarmed");
            self.events.emit(LifecycleEvent::PoolPrewarmed {
                pool: self.key.clone(),
                total: self.slots.len(),
            });
        }
        CreationProgress::Complete
    }

    /// Runs the pending creation job to completion in one go.
    ///
    /// Returns the number of instances created. Meant for load screens and
    /// tests; the frame loop should let the scheduler spread the work.
    pub fn finish_creation(&mut self) -> usize {
        let before = self.slots.len();
        while self.resume_creation().is_pending() {}
        self.slots.len() - before
    }

    fn create_instance(&mut self) -> Option<u32> {
        let value = self.prototype.as_ref()?.instantiate();
        let index = u32::try_from(self.slots.len()).ok()?;
        self.slots.push(Slot {
            node: Pooled::new(value),
            state: InstanceState::Available,
        });
        self.available.push_back(index);
        self.events.emit(LifecycleEvent::ObjectCreated {
            pool: self.key.clone(),
            instance: InstanceId::new(index, self.epoch),
        });
        Some(index)
    }

    /// Hands out an instance.
    ///
    /// Reuses the oldest returned instance first; otherwise grows if allowed.
    ///
    /// # Errors
    ///
    /// - [`PoolError::NotReady`] if the pool is uninitialized, or still
    ///   prewarming with nothing available yet.
    /// - [`PoolError::Exhausted`] if nothing is available and the pool may
    ///   not grow.
    pub fn get(&mut self) -> PoolResult<InstanceId> {
        if !self.initialized {
            tracing::warn!(pool = ?self.key, "get on uninitialized pool");
            return Err(PoolError::NotReady(self.label()));
        }

        let index = if let Some(index) = self.available.pop_front() {
            index
        } else if self.status() == PoolStatus::Prewarming {
            tracing::warn!(pool = ?self.key, "get while prewarm is still in flight");
            return Err(PoolError::NotReady(self.label()));
        } else if self.config.allow_growth && self.slots.len() < self.config.max_size {
            if self.create_instance().is_none() {
                return Err(PoolError::NotReady(self.label()));
            }
            match self.available.pop_front() {
                Some(index) => index,
                None => return Err(PoolError::NotReady(self.label())),
            }
        } else {
            tracing::warn!(
                pool = ?self.key,
                total = self.slots.len(),
                max = self.config.max_size,
                "pool exhausted"
            );
            return Err(PoolError::Exhausted {
                pool: self.label(),
                total: self.slots.len(),
                max: self.config.max_size,
            });
        };

        let slot = &mut self.slots[index as usize];
        slot.state = InstanceState::InUse;
        slot.node.activate();
        slot.node.value_mut().on_get_from_pool();

        let id = InstanceId::new(index, self.epoch);
        self.events.emit(LifecycleEvent::ObjectSpawned {
            pool: self.key.clone(),
            instance: id,
        });
        Ok(id)
    }

    /// Takes an instance back.
    ///
    /// The instance is reset to its inert state (inactive, identity
    /// transform, parented to storage) and appended to the available queue.
    ///
    /// # Errors
    ///
    /// - [`PoolError::ForeignInstance`] if the handle is not from this
    ///   population.
    /// - [`PoolError::AlreadyAvailable`] if it was already returned.
    ///
    /// Both leave the pool untouched.
    pub fn return_instance(&mut self, id: InstanceId) -> PoolResult<()> {
        let Some(index) = self.slot_index(id) else {
            tracing::warn!(pool = ?self.key, instance = %id, "trying to return invalid instance to pool");
            return Err(PoolError::ForeignInstance {
                pool: self.label(),
                instance: id.to_string(),
            });
        };

        let slot = &mut self.slots[index];
        if slot.state == InstanceState::Available {
            tracing::warn!(pool = ?self.key, instance = %id, "instance already returned");
            return Err(PoolError::AlreadyAvailable {
                pool: self.label(),
                instance: id.to_string(),
            });
        }

        slot.node.value_mut().on_return_to_pool();
        slot.node.reset_inert();
        slot.state = InstanceState::Available;
        self.available.push_back(id.slot());

        self.events.emit(LifecycleEvent::ObjectReturned {
            pool: self.key.clone(),
            instance: id,
        });
        Ok(())
    }

    /// Destroys every instance and resets the pool to uninitialized.
    ///
    /// Pending creation is cancelled. Returns the number of instances
    /// destroyed.
    pub fn clear(&mut self) -> usize {
        self.token.cancel();
        self.creation = None;

        let destroyed = self.slots.len();
        let was_initialized = self.initialized;
        self.available.clear();
        self.slots.clear();
        self.prototype = None;
        self.initialized = false;
        self.prewarmed = false;

        if was_initialized || destroyed > 0 {
            tracing::info!(pool = ?self.key, destroyed, "pool cleared");
            self.events.emit(LifecycleEvent::PoolCleared {
                pool: self.key.clone(),
                destroyed,
            });
        }
        destroyed
    }

    fn slot_index(&self, id: InstanceId) -> Option<usize> {
        if !self.initialized || id.epoch() != self.epoch {
            return None;
        }
        let index = id.slot() as usize;
        (index < self.slots.len()).then_some(index)
    }

    fn label(&self) -> String {
        format!("{:?}", self.key)
    }

    /// Returns true if the handle belongs to this population.
    #[must_use]
    pub fn contains(&self, id: InstanceId) -> bool {
        self.slot_index(id).is_some()
    }

    /// State of an instance, if it belongs to this pool.
    #[must_use]
    pub fn state_of(&self, id: InstanceId) -> Option<InstanceState> {
        self.slot_index(id).map(|index| self.slots[index].state)
    }

    /// Borrows an instance.
    #[must_use]
    pub fn instance(&self, id: InstanceId) -> Option<&Pooled<T>> {
        self.slot_index(id).map(|index| &self.slots[index].node)
    }

    /// Borrows an instance mutably.
    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Pooled<T>> {
        let index = self.slot_index(id)?;
        Some(&mut self.slots[index].node)
    }

    /// Handles of every instance currently handed out.
    pub fn in_use(&self) -> impl Iterator<Item = InstanceId> + '_ {
        let epoch = self.epoch;
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state == InstanceState::InUse)
            .map(move |(index, _)| InstanceId::new(index as u32, epoch))
    }

    /// Readiness of the pool.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        if !self.initialized {
            PoolStatus::Uninitialized
        } else if self.creation.is_some_and(|job| job.prewarm) && !self.prewarmed {
            PoolStatus::Prewarming
        } else {
            PoolStatus::Ready
        }
    }

    /// Returns true if `get()` can be served without a readiness error.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status() == PoolStatus::Ready
    }

    /// Returns true while a creation job is pending.
    #[must_use]
    pub fn is_creating(&self) -> bool {
        self.creation.is_some()
    }

    /// Whether prewarm has completed.
    #[inline]
    #[must_use]
    pub const fn is_prewarmed(&self) -> bool {
        self.prewarmed
    }

    /// Instances waiting in the available queue.
    #[inline]
    #[must_use]
    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    /// Instances the pool owns.
    #[inline]
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.slots.len()
    }

    /// Snapshot of the population.
    #[must_use]
    pub fn stats(&self) -> PoolStats<K> {
        PoolStats {
            key: self.key.clone(),
            available: self.available.len(),
            total: self.slots.len(),
            max_size: self.config.max_size,
            prewarmed: self.prewarmed,
            status: self.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Parent;
    use crate::prototype::FnPrototype;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use respawn_shared::Vec3;

    #[derive(Debug, Default)]
    struct Orb {
        spawned: u32,
        returned: u32,
    }

    impl Poolable for Orb {
        fn on_get_from_pool(&mut self) {
            self.spawned += 1;
        }

        fn on_return_to_pool(&mut self) {
            self.returned += 1;
        }
    }

    fn orb_prototype(key: &'static str) -> Arc<dyn Prototype<&'static str, Orb>> {
        Arc::new(FnPrototype::new(key, Orb::default))
    }

    fn ready_pool(initial: usize, max: usize, growth: bool) -> Pool<&'static str, Orb> {
        let mut pool = Pool::new("orb");
        pool.initialize(orb_prototype("orb"), PoolConfig::new(initial, max, growth))
            .unwrap();
        pool.finish_creation();
        pool
    }

    #[test]
    fn test_growth_boundary() {
        let mut pool = ready_pool(10, 15, true);
        assert_eq!(pool.available_count(), 10);
        assert_eq!(pool.total_count(), 10);
        assert!(pool.is_prewarmed());

        for _ in 0..10 {
            pool.get().unwrap();
        }
        assert_eq!(pool.available_count(), 0);
        assert_eq!(pool.total_count(), 10);

        pool.get().unwrap();
        pool.get().unwrap();
        assert_eq!(pool.total_count(), 12);

        pool.get().unwrap();
        assert_eq!(pool.total_count(), 13);

        pool.get().unwrap();
        pool.get().unwrap();
        assert_eq!(pool.total_count(), 15);

        let err = pool.get().unwrap_err();
        assert!(matches!(err, PoolError::Exhausted { total: 15, max: 15, .. }));
        assert_eq!(pool.total_count(), 15);
    }

    #[test]
    fn test_prewarm_is_chunked() {
        let mut pool: Pool<&'static str, Orb> = Pool::new("orb");
        pool.initialize(orb_prototype("orb"), PoolConfig::new(12, 20, true))
            .unwrap();
        assert_eq!(pool.total_count(), 0);
        assert_eq!(pool.status(), PoolStatus::Prewarming);

        assert_eq!(pool.resume_creation(), CreationProgress::Pending);
        assert_eq!(pool.total_count(), 5);
        assert_eq!(pool.resume_creation(), CreationProgress::Pending);
        assert_eq!(pool.total_count(), 10);
        assert_eq!(pool.resume_creation(), CreationProgress::Complete);
        assert_eq!(pool.total_count(), 12);
        assert!(pool.is_prewarmed());
        assert_eq!(pool.status(), PoolStatus::Ready);
        assert_eq!(pool.resume_creation(), CreationProgress::Idle);
    }

    #[test]
    fn test_not_ready_is_distinct_from_exhausted() {
        let mut pool: Pool<&'static str, Orb> = Pool::new("orb");
        assert!(matches!(pool.get(), Err(PoolError::NotReady(_))));

        pool.initialize(orb_prototype("orb"), PoolConfig::new(10, 10, false))
            .unwrap();
        // Prewarm has not produced anything yet.
        assert!(matches!(pool.get(), Err(PoolError::NotReady(_))));

        // First batch lands; the pool serves from it while still prewarming.
        pool.resume_creation();
        assert_eq!(pool.status(), PoolStatus::Prewarming);
        assert!(pool.get().is_ok());
    }

    #[test]
    fn test_round_trip_resets_instance() {
        let mut pool = ready_pool(3, 3, false);
        let before = pool.available_count();

        let id = pool.get().unwrap();
        {
            let node = pool.instance_mut(id).unwrap();
            assert!(node.is_active());
            assert_eq!(node.value().spawned, 1);
            node.transform.position = Vec3::new(4.0, 2.0, 0.0);
            node.transform.scale = Vec3::new(2.0, 2.0, 2.0);
            node.set_parent(Parent::World);
        }
        assert_eq!(pool.state_of(id), Some(InstanceState::InUse));

        pool.return_instance(id).unwrap();
        assert_eq!(pool.available_count(), before);

        let node = pool.instance(id).unwrap();
        assert!(node.is_inert());
        assert_eq!(node.value().returned, 1);
        assert_eq!(pool.state_of(id), Some(InstanceState::Available));
    }

    #[test]
    fn test_fifo_reuse() {
        let mut pool = ready_pool(3, 3, false);
        let a = pool.get().unwrap();
        let b = pool.get().unwrap();
        let c = pool.get().unwrap();

        pool.return_instance(b).unwrap();
        pool.return_instance(a).unwrap();
        pool.return_instance(c).unwrap();

        assert_eq!(pool.get().unwrap(), b);
        assert_eq!(pool.get().unwrap(), a);
        assert_eq!(pool.get().unwrap(), c);
    }

    #[test]
    fn test_double_return_is_noop() {
        let mut pool = ready_pool(2, 2, false);
        let id = pool.get().unwrap();
        pool.return_instance(id).unwrap();
        let stats = pool.stats();

        let err = pool.return_instance(id).unwrap_err();
        assert!(matches!(err, PoolError::AlreadyAvailable { .. }));
        assert_eq!(pool.stats(), stats);
        assert_eq!(pool.instance(id).unwrap().value().returned, 1);
    }

    #[test]
    fn test_foreign_and_stale_returns_are_rejected() {
        let mut pool = ready_pool(2, 2, false);
        let mut other: Pool<&'static str, Orb> = Pool::new("other");
        other
            .initialize(orb_prototype("other"), PoolConfig::new(2, 2, false))
            .unwrap();
        other.finish_creation();

        let foreign = other.get().unwrap();
        assert!(matches!(
            pool.return_instance(foreign),
            Err(PoolError::ForeignInstance { .. })
        ));

        let stale = pool.get().unwrap();
        pool.clear();
        pool.initialize(orb_prototype("orb"), PoolConfig::new(2, 2, false))
            .unwrap();
        pool.finish_creation();
        assert!(!pool.contains(stale));
        assert!(matches!(
            pool.return_instance(stale),
            Err(PoolError::ForeignInstance { .. })
        ));
        assert_eq!(pool.available_count(), 2);
    }

    #[test]
    fn test_capacity_invariant_under_random_traffic() {
        let mut pool = ready_pool(6, 8, false);
        let mut rng = ChaCha8Rng::seed_from_u64(0x5EED);
        let mut live: Vec<InstanceId> = Vec::new();
        let mut last_total = pool.total_count();

        for _ in 0..2_000 {
            if rng.gen_bool(0.55) {
                if let Ok(id) = pool.get() {
                    live.push(id);
                }
            } else if !live.is_empty() {
                let id = live.swap_remove(rng.gen_range(0..live.len()));
                pool.return_instance(id).unwrap();
            }

            let stats = pool.stats();
            assert!(stats.available <= stats.total);
            assert!(stats.total <= 8);
            assert!(stats.total >= last_total);
            assert_eq!(stats.in_use(), live.len());
            last_total = stats.total;
        }
        // Growth disabled: nothing beyond the prewarmed population.
        assert_eq!(pool.total_count(), 6);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut pool = ready_pool(4, 8, true);
        pool.get().unwrap();

        assert_eq!(pool.clear(), 4);
        assert_eq!(pool.total_count(), 0);
        assert_eq!(pool.available_count(), 0);
        assert!(!pool.is_prewarmed());
        assert_eq!(pool.status(), PoolStatus::Uninitialized);
        assert!(matches!(pool.get(), Err(PoolError::NotReady(_))));
    }

    #[test]
    fn test_clear_mid_prewarm_drops_creation() {
        let mut pool: Pool<&'static str, Orb> = Pool::new("orb");
        pool.initialize(orb_prototype("orb"), PoolConfig::new(20, 20, true))
            .unwrap();
        let token = pool.token();
        pool.resume_creation();

        pool.clear();
        assert!(token.is_cancelled());
        assert_eq!(pool.resume_creation(), CreationProgress::Idle);
        assert_eq!(pool.total_count(), 0);
    }

    #[test]
    fn test_expand_pool_clamps_at_max() {
        let mut pool = ready_pool(5, 12, false);
        assert_eq!(pool.expand_pool(10), 7);
        assert!(pool.is_creating());
        assert_eq!(pool.finish_creation(), 7);
        assert_eq!(pool.total_count(), 12);
        assert_eq!(pool.available_count(), 12);
        assert_eq!(pool.expand_pool(3), 0);
    }

    #[test]
    fn test_prewarm_twice_doubles_population() {
        let mut pool = ready_pool(4, 20, false);
        assert_eq!(pool.prewarm(), 4);
        pool.finish_creation();
        assert_eq!(pool.total_count(), 8);
    }

    #[test]
    fn test_invalid_config_leaves_pool_uninitialized() {
        let mut pool: Pool<&'static str, Orb> = Pool::new("orb");
        let err = pool
            .initialize(orb_prototype("orb"), PoolConfig::new(5, 0, true))
            .unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig(_)));
        assert_eq!(pool.status(), PoolStatus::Uninitialized);

        let err = pool
            .initialize(orb_prototype("orb"), PoolConfig::new(20, 10, true))
            .unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig(_)));

        let err = pool
            .initialize(orb_prototype("spark"), PoolConfig::default())
            .unwrap_err();
        assert!(matches!(err, PoolError::PrototypeMismatch { .. }));
    }

    #[test]
    fn test_configure_without_prewarm_grows_on_demand() {
        let mut pool: Pool<&'static str, Orb> = Pool::new("orb");
        pool.configure(orb_prototype("orb"), PoolConfig::new(10, 2, true).with_creation_batch(1))
            .unwrap_err();

        pool.configure(orb_prototype("orb"), PoolConfig::new(1, 2, true))
            .unwrap();
        assert!(pool.is_ready());
        assert_eq!(pool.total_count(), 0);

        pool.get().unwrap();
        pool.get().unwrap();
        assert!(matches!(pool.get(), Err(PoolError::Exhausted { .. })));
    }

    #[test]
    fn test_lifecycle_events() {
        let mut pool: Pool<&'static str, Orb> = Pool::new("orb");
        let events = pool.subscribe();
        pool.initialize(orb_prototype("orb"), PoolConfig::new(1, 1, false))
            .unwrap();
        pool.finish_creation();

        let id = pool.get().unwrap();
        pool.return_instance(id).unwrap();

        let seen: Vec<_> = events.try_iter().collect();
        assert_eq!(
            seen,
            vec![
                LifecycleEvent::ObjectCreated { pool: "orb", instance: id },
                LifecycleEvent::PoolPrewarmed { pool: "orb", total: 1 },
                LifecycleEvent::ObjectSpawned { pool: "orb", instance: id },
                LifecycleEvent::ObjectReturned { pool: "orb", instance: id },
            ]
        );
    }
}
