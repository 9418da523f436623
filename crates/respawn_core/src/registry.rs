//! # Pool Registry
//!
//! Key-addressable directory over many pools. Besides `key → pool` it keeps
//! a reverse map `instance → key`, so anything handed out through
//! [`PoolRegistry::get`] can be returned by handle alone.
//!
//! The registry also owns the tick scheduler that spreads prewarm and
//! expansion over frames, and the scene-parent bookkeeping used to attach
//! one live instance under another.

use crossbeam_channel::Receiver;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{PoolError, PoolResult};
use crate::event::{EventBus, LifecycleEvent};
use crate::instance::{InstanceId, Parent, Poolable, Pooled};
use crate::pool::{CreationProgress, Pool, PoolConfig, PoolStats};
use crate::prototype::{PoolKey, Prototype};
use crate::schedule::Scheduler;

/// Deferred creation batch for one pool population.
#[derive(Clone, Debug)]
struct CreationTask<K> {
    key: K,
    /// Population the task was scheduled for; a cleared or rebuilt pool
    /// has a different epoch.
    epoch: u32,
}

/// Directory of pools keyed by prototype identity.
pub struct PoolRegistry<K, T> {
    pools: HashMap<K, Pool<K, T>>,
    /// Keys in creation order, for stable stat reports.
    order: Vec<K>,
    owners: HashMap<InstanceId, K>,
    scheduler: Scheduler<CreationTask<K>>,
    resuming: HashSet<K>,
    events: EventBus<LifecycleEvent<K>>,
}

impl<K: PoolKey, T: Poolable> PoolRegistry<K, T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pools: HashMap::new(),
            order: Vec::new(),
            owners: HashMap::new(),
            scheduler: Scheduler::new(),
            resuming: HashSet::new(),
            events: EventBus::new(),
        }
    }

    /// Subscribes to lifecycle events of every pool, present and future.
    pub fn subscribe(&mut self) -> Receiver<LifecycleEvent<K>> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        for pool in self.pools.values_mut() {
            pool.add_sink(sender.clone());
        }
        self.events.add_sink(sender);
        receiver
    }

    /// Creates and registers a pool for `prototype`.
    ///
    /// If a pool already exists for the prototype's key, that pool is
    /// returned unchanged. With `prewarm`, creation is spread over the
    /// following ticks; without it the pool starts empty and grows on demand.
    ///
    /// # Errors
    ///
    /// Configuration errors from [`Pool::initialize`]; nothing is registered.
    pub fn create_pool(
        &mut self,
        prototype: Arc<dyn Prototype<K, T>>,
        config: PoolConfig,
        prewarm: bool,
    ) -> PoolResult<&mut Pool<K, T>> {
        let key = prototype.key();
        match self.pools.entry(key.clone()) {
            Entry::Occupied(entry) => {
                tracing::warn!(pool = ?key, "pool already exists");
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let mut pool = Pool::new(key.clone());
                for sink in self.events.sinks() {
                    pool.add_sink(sink.clone());
                }
                if prewarm {
                    pool.initialize(prototype, config)?;
                } else {
                    pool.configure(prototype, config)?;
                }

                if pool.is_creating() {
                    self.resuming.insert(key.clone());
                    self.scheduler.schedule_next_tick(
                        CreationTask {
                            key: key.clone(),
                            epoch: pool.epoch(),
                        },
                        pool.token(),
                    );
                }

                self.order.push(key.clone());
                self.events
                    .emit(LifecycleEvent::PoolCreated { pool: key.clone() });
                tracing::info!(
                    pool = ?key,
                    initial = config.initial_size,
                    max = config.max_size,
                    prewarm,
                    "pool created"
                );
                Ok(entry.insert(pool))
            }
        }
    }

    /// Looks up a pool.
    #[must_use]
    pub fn get_pool(&self, key: &K) -> Option<&Pool<K, T>> {
        self.pools.get(key)
    }

    /// Looks up a pool mutably.
    ///
    /// Instances taken directly from the pool bypass the reverse map and
    /// must be returned to the pool directly as well.
    pub fn get_pool_mut(&mut self, key: &K) -> Option<&mut Pool<K, T>> {
        self.pools.get_mut(key)
    }

    /// Returns true if a pool is registered under `key`.
    #[must_use]
    pub fn has_pool(&self, key: &K) -> bool {
        self.pools.contains_key(key)
    }

    /// Hands out an instance from the pool under `key` and tracks it.
    ///
    /// # Errors
    ///
    /// [`PoolError::UnknownKey`] if no such pool exists, otherwise whatever
    /// [`Pool::get`] reports.
    pub fn get(&mut self, key: &K) -> PoolResult<InstanceId> {
        let Some(pool) = self.pools.get_mut(key) else {
            tracing::warn!(pool = ?key, "pool not found");
            return Err(PoolError::UnknownKey(format!("{key:?}")));
        };
        let id = pool.get()?;
        self.owners.insert(id, key.clone());
        Ok(id)
    }

    /// Returns a tracked instance to the pool it came from.
    ///
    /// The tracking entry is dropped whatever the pool answers. Links to a
    /// scene parent or to children are severed first.
    ///
    /// # Errors
    ///
    /// [`PoolError::NotTracked`] if the instance did not come from
    /// [`PoolRegistry::get`] (or was already returned), otherwise whatever
    /// [`Pool::return_instance`] reports.
    pub fn return_instance(&mut self, id: InstanceId) -> PoolResult<()> {
        let Some(key) = self.owners.remove(&id) else {
            tracing::warn!(instance = %id, "instance not found in pool mapping");
            return Err(PoolError::NotTracked(id.to_string()));
        };

        self.sever_links(id, &key);

        let Some(pool) = self.pools.get_mut(&key) else {
            return Err(PoolError::UnknownKey(format!("{key:?}")));
        };
        pool.return_instance(id)
    }

    fn sever_links(&mut self, id: InstanceId, key: &K) {
        let Some(node) = self
            .pools
            .get_mut(key)
            .and_then(|pool| pool.instance_mut(id))
        else {
            return;
        };
        let parent = node.parent();
        let children = node.take_children();

        if let Parent::Instance(parent_id) = parent {
            if let Some(parent_node) = self.instance_mut(parent_id) {
                parent_node.remove_child(id);
            }
        }
        for child in children {
            if let Some(child_node) = self.instance_mut(child) {
                child_node.set_parent(Parent::World);
            }
        }
    }

    /// Attaches `child` under `parent`. Both must be tracked instances.
    ///
    /// The child is detached from any previous parent first.
    ///
    /// # Errors
    ///
    /// [`PoolError::NotTracked`] for an untracked handle,
    /// [`PoolError::InvalidAttachment`] if the link would form a cycle.
    pub fn attach(&mut self, child: InstanceId, parent: InstanceId) -> PoolResult<()> {
        for id in [child, parent] {
            if !self.owners.contains_key(&id) {
                tracing::warn!(instance = %id, "cannot attach untracked instance");
                return Err(PoolError::NotTracked(id.to_string()));
            }
        }

        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return Err(PoolError::InvalidAttachment {
                    child: child.to_string(),
                    parent: parent.to_string(),
                });
            }
            cursor = match self.instance(current).map(Pooled::parent) {
                Some(Parent::Instance(next)) => Some(next),
                _ => None,
            };
        }

        self.detach(child);
        if let Some(node) = self.instance_mut(child) {
            node.set_parent(Parent::Instance(parent));
        }
        if let Some(node) = self.instance_mut(parent) {
            node.add_child(child);
        }
        Ok(())
    }

    /// Detaches an instance from its scene parent, leaving it in the world.
    pub fn detach(&mut self, child: InstanceId) {
        let Some(parent) = self.instance(child).map(Pooled::parent) else {
            return;
        };
        if let Parent::Instance(parent_id) = parent {
            if let Some(node) = self.instance_mut(parent_id) {
                node.remove_child(child);
            }
            if let Some(node) = self.instance_mut(child) {
                node.set_parent(Parent::World);
            }
        }
    }

    /// Instances attached under `id`.
    #[must_use]
    pub fn children(&self, id: InstanceId) -> Vec<InstanceId> {
        self.instance(id)
            .map(|node| node.children().to_vec())
            .unwrap_or_default()
    }

    /// Borrows any instance owned by a registered pool.
    #[must_use]
    pub fn instance(&self, id: InstanceId) -> Option<&Pooled<T>> {
        if let Some(key) = self.owners.get(&id) {
            return self.pools.get(key)?.instance(id);
        }
        self.pools.values().find_map(|pool| pool.instance(id))
    }

    /// Borrows any instance owned by a registered pool, mutably.
    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Pooled<T>> {
        if let Some(key) = self.owners.get(&id) {
            return self.pools.get_mut(key)?.instance_mut(id);
        }
        self.pools
            .values_mut()
            .find_map(|pool| pool.instance_mut(id))
    }

    /// Key of the pool a tracked instance came from.
    #[must_use]
    pub fn owner_of(&self, id: InstanceId) -> Option<&K> {
        self.owners.get(&id)
    }

    /// Returns true if the instance is handed out and tracked.
    #[must_use]
    pub fn is_tracked(&self, id: InstanceId) -> bool {
        self.owners.contains_key(&id)
    }

    /// Number of tracked (handed out) instances.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.owners.len()
    }

    /// Number of registered pools.
    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Registered keys in creation order.
    #[must_use]
    pub fn keys(&self) -> &[K] {
        &self.order
    }

    /// Snapshot of one pool.
    #[must_use]
    pub fn get_stats(&self, key: &K) -> Option<PoolStats<K>> {
        self.pools.get(key).map(Pool::stats)
    }

    /// Snapshots of every pool in creation order.
    #[must_use]
    pub fn all_stats(&self) -> Vec<PoolStats<K>> {
        self.order
            .iter()
            .filter_map(|key| self.get_stats(key))
            .collect()
    }

    /// Returns true if the pool exists and has finished prewarming.
    #[must_use]
    pub fn is_ready(&self, key: &K) -> bool {
        self.pools.get(key).is_some_and(Pool::is_ready)
    }

    /// Schedules `additional` more instances for the pool under `key`.
    ///
    /// Returns how many creations were planned (capped at the pool max).
    ///
    /// # Errors
    ///
    /// [`PoolError::UnknownKey`] if no such pool exists.
    pub fn expand_pool(&mut self, key: &K, additional: usize) -> PoolResult<usize> {
        let Some(pool) = self.pools.get_mut(key) else {
            return Err(PoolError::UnknownKey(format!("{key:?}")));
        };
        let added = pool.expand_pool(additional);
        if added > 0 && self.resuming.insert(key.clone()) {
            self.scheduler.schedule_next_tick(
                CreationTask {
                    key: key.clone(),
                    epoch: pool.epoch(),
                },
                pool.token(),
            );
        }
        Ok(added)
    }

    /// Advances the creation scheduler by `dt`.
    ///
    /// Each due task re-validates its pool before creating one batch and
    /// re-queues itself for the next tick if more remain. Returns the number
    /// of batches run.
    pub fn tick(&mut self, dt: Duration) -> usize {
        self.adopt_orphaned_creation();
        let mut batches = 0;
        for task in self.scheduler.advance(dt) {
            self.resuming.remove(&task.key);

            let Some(pool) = self.pools.get_mut(&task.key) else {
                tracing::trace!(pool = ?task.key, "creation task for a removed pool");
                continue;
            };
            if pool.epoch() != task.epoch {
                tracing::trace!(pool = ?task.key, "creation task for a rebuilt pool");
                continue;
            }

            batches += 1;
            if pool.resume_creation() == CreationProgress::Pending {
                let token = pool.token();
                self.resuming.insert(task.key.clone());
                self.scheduler.schedule_next_tick(task, token);
            }
        }
        batches
    }

    /// Schedules creation started on a pool directly, through the pool
    /// returned by [`PoolRegistry::create_pool`] or
    /// [`PoolRegistry::get_pool_mut`].
    fn adopt_orphaned_creation(&mut self) {
        for key in &self.order {
            if self.resuming.contains(key) {
                continue;
            }
            let Some(pool) = self.pools.get(key) else {
                continue;
            };
            let token = pool.token();
            if !pool.is_creating() || token.is_cancelled() {
                continue;
            }
            tracing::debug!(pool = ?key, "scheduling creation started on the pool");
            self.resuming.insert(key.clone());
            self.scheduler.schedule_next_tick(
                CreationTask {
                    key: key.clone(),
                    epoch: pool.epoch(),
                },
                token,
            );
        }
    }

    /// Runs every pending creation task to completion right now.
    ///
    /// Returns the number of instances created.
    pub fn finish_pending_creation(&mut self) -> usize {
        let before: usize = self.pools.values().map(Pool::total_count).sum();
        loop {
            self.adopt_orphaned_creation();
            if self.scheduler.is_idle() {
                break;
            }
            self.tick(Duration::ZERO);
        }
        let after: usize = self.pools.values().map(Pool::total_count).sum();
        after.saturating_sub(before)
    }

    /// Simulated time of the creation scheduler.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// Destroys one pool's population and unregisters it.
    ///
    /// Tracking entries for its instances are purged, and instances in other
    /// pools attached to them are left in the world. Returns false if no
    /// such pool existed.
    pub fn clear_pool(&mut self, key: &K) -> bool {
        let Some(mut pool) = self.pools.remove(key) else {
            tracing::debug!(pool = ?key, "clear requested for unknown pool");
            return false;
        };
        let epoch = pool.epoch();
        pool.clear();

        self.order.retain(|k| k != key);
        self.owners.retain(|_, owner| owner != key);
        self.resuming.remove(key);
        self.forget_epoch(epoch);
        true
    }

    fn forget_epoch(&mut self, epoch: u32) {
        for pool in self.pools.values_mut() {
            let live: Vec<InstanceId> = pool.in_use().collect();
            for id in live {
                let Some(node) = pool.instance_mut(id) else {
                    continue;
                };
                if matches!(node.parent(), Parent::Instance(p) if p.epoch() == epoch) {
                    node.set_parent(Parent::World);
                }
                node.retain_children(|child| child.epoch() != epoch);
            }
        }
    }

    /// Destroys every pool and forgets every tracked instance.
    pub fn clear_all_pools(&mut self) {
        for pool in self.pools.values_mut() {
            pool.clear();
        }
        self.pools.clear();
        self.order.clear();
        self.owners.clear();
        self.resuming.clear();
        self.scheduler.clear();
        tracing::info!("all pools cleared");
    }
}

impl<K: PoolKey, T: Poolable> Default for PoolRegistry<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolStatus;
    use crate::prototype::FnPrototype;
    use respawn_shared::Vec3;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    enum Fx {
        Spark,
        Smoke,
    }

    #[derive(Debug, Default)]
    struct Particle;

    impl Poolable for Particle {}

    fn proto(key: Fx) -> Arc<dyn Prototype<Fx, Particle>> {
        Arc::new(FnPrototype::new(key, || Particle))
    }

    fn registry_with(key: Fx, config: PoolConfig) -> PoolRegistry<Fx, Particle> {
        let mut registry = PoolRegistry::new();
        registry.create_pool(proto(key), config, true).unwrap();
        registry.finish_pending_creation();
        registry
    }

    #[test]
    fn test_create_pool_is_idempotent() {
        let mut registry = registry_with(Fx::Spark, PoolConfig::new(5, 10, true));

        let first = registry
            .create_pool(proto(Fx::Spark), PoolConfig::new(1, 1, false), true)
            .unwrap();
        first.get().unwrap();
        let second = registry
            .create_pool(proto(Fx::Spark), PoolConfig::default(), true)
            .unwrap();
        second.get().unwrap();

        assert_eq!(registry.pool_count(), 1);
        let stats = registry.get_stats(&Fx::Spark).unwrap();
        assert_eq!(stats.available, 3);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.max_size, 10);
    }

    #[test]
    fn test_get_and_return_tracks_owner() {
        let mut registry = registry_with(Fx::Spark, PoolConfig::new(2, 2, false));

        let id = registry.get(&Fx::Spark).unwrap();
        assert!(registry.is_tracked(id));
        assert_eq!(registry.owner_of(id), Some(&Fx::Spark));

        registry.return_instance(id).unwrap();
        assert!(!registry.is_tracked(id));
        assert_eq!(registry.get_stats(&Fx::Spark).unwrap().available, 2);

        assert!(matches!(
            registry.return_instance(id),
            Err(PoolError::NotTracked(_))
        ));
    }

    #[test]
    fn test_unknown_key_never_creates() {
        let mut registry: PoolRegistry<Fx, Particle> = PoolRegistry::new();
        assert!(matches!(
            registry.get(&Fx::Smoke),
            Err(PoolError::UnknownKey(_))
        ));
        assert!(!registry.has_pool(&Fx::Smoke));
        assert!(registry.get_stats(&Fx::Smoke).is_none());
    }

    #[test]
    fn test_direct_pool_gets_are_not_tracked() {
        let mut registry = registry_with(Fx::Spark, PoolConfig::new(2, 2, false));
        let id = registry.get_pool_mut(&Fx::Spark).unwrap().get().unwrap();

        assert!(!registry.is_tracked(id));
        assert!(matches!(
            registry.return_instance(id),
            Err(PoolError::NotTracked(_))
        ));
        registry
            .get_pool_mut(&Fx::Spark)
            .unwrap()
            .return_instance(id)
            .unwrap();
    }

    #[test]
    fn test_prewarm_is_spread_over_ticks() {
        let mut registry: PoolRegistry<Fx, Particle> = PoolRegistry::new();
        registry
            .create_pool(proto(Fx::Smoke), PoolConfig::new(12, 20, true), true)
            .unwrap();
        assert_eq!(
            registry.get_stats(&Fx::Smoke).unwrap().status,
            PoolStatus::Prewarming
        );

        let tick = Duration::from_millis(16);
        assert_eq!(registry.tick(tick), 1);
        assert_eq!(registry.get_stats(&Fx::Smoke).unwrap().total, 5);
        registry.tick(tick);
        assert_eq!(registry.get_stats(&Fx::Smoke).unwrap().total, 10);
        registry.tick(tick);
        assert!(registry.is_ready(&Fx::Smoke));
        assert_eq!(registry.get_stats(&Fx::Smoke).unwrap().total, 12);
        assert_eq!(registry.tick(tick), 0);
    }

    #[test]
    fn test_creation_started_on_the_pool_is_driven() {
        let mut registry: PoolRegistry<Fx, Particle> = PoolRegistry::new();
        let planned = registry
            .create_pool(proto(Fx::Spark), PoolConfig::new(10, 20, true), false)
            .unwrap()
            .prewarm();
        assert_eq!(planned, 10);

        registry.tick(Duration::from_millis(16));
        assert_eq!(registry.get_stats(&Fx::Spark).unwrap().total, 5);
        registry.finish_pending_creation();
        assert!(registry.is_ready(&Fx::Spark));
        assert!(registry.get(&Fx::Spark).is_ok());

        registry.get_pool_mut(&Fx::Spark).unwrap().expand_pool(4);
        assert_eq!(registry.finish_pending_creation(), 4);
        assert_eq!(registry.get_stats(&Fx::Spark).unwrap().total, 14);
    }

    #[test]
    fn test_clear_mid_prewarm_abandons_task() {
        let mut registry: PoolRegistry<Fx, Particle> = PoolRegistry::new();
        registry
            .create_pool(proto(Fx::Smoke), PoolConfig::new(20, 20, true), true)
            .unwrap();
        registry.tick(Duration::ZERO);

        assert!(registry.clear_pool(&Fx::Smoke));
        assert_eq!(registry.tick(Duration::ZERO), 0);

        // A fresh pool under the same key gets its own task.
        registry
            .create_pool(proto(Fx::Smoke), PoolConfig::new(3, 3, true), true)
            .unwrap();
        registry.finish_pending_creation();
        assert_eq!(registry.get_stats(&Fx::Smoke).unwrap().total, 3);
    }

    #[test]
    fn test_clear_pool_purges_tracking() {
        let mut registry = registry_with(Fx::Spark, PoolConfig::new(3, 3, false));
        registry
            .create_pool(proto(Fx::Smoke), PoolConfig::new(3, 3, false), true)
            .unwrap();
        registry.finish_pending_creation();

        let spark = registry.get(&Fx::Spark).unwrap();
        let smoke = registry.get(&Fx::Smoke).unwrap();
        registry.attach(smoke, spark).unwrap();

        assert!(registry.clear_pool(&Fx::Spark));
        assert!(!registry.is_tracked(spark));
        assert!(registry.is_tracked(smoke));
        assert_eq!(registry.instance(smoke).unwrap().parent(), Parent::World);
        assert_eq!(registry.keys(), &[Fx::Smoke]);
        assert!(!registry.clear_pool(&Fx::Spark));
    }

    #[test]
    fn test_clear_all_pools() {
        let mut registry = registry_with(Fx::Spark, PoolConfig::new(3, 3, false));
        registry.get(&Fx::Spark).unwrap();
        registry.clear_all_pools();

        assert_eq!(registry.pool_count(), 0);
        assert_eq!(registry.tracked_count(), 0);
        assert!(registry.all_stats().is_empty());
    }

    #[test]
    fn test_attach_and_return_severs_links() {
        let mut registry = registry_with(Fx::Spark, PoolConfig::new(2, 2, false));
        registry
            .create_pool(proto(Fx::Smoke), PoolConfig::new(2, 2, false), true)
            .unwrap();
        registry.finish_pending_creation();

        let holder = registry.get(&Fx::Spark).unwrap();
        let puff = registry.get(&Fx::Smoke).unwrap();
        registry.attach(puff, holder).unwrap();
        assert_eq!(registry.children(holder), vec![puff]);
        assert_eq!(
            registry.instance(puff).unwrap().parent(),
            Parent::Instance(holder)
        );

        assert!(matches!(
            registry.attach(holder, puff),
            Err(PoolError::InvalidAttachment { .. })
        ));

        registry.instance_mut(puff).unwrap().transform.position = Vec3::new(1.0, 1.0, 1.0);
        registry.return_instance(puff).unwrap();
        assert!(registry.children(holder).is_empty());
        assert!(registry.instance(puff).unwrap().is_inert());
    }

    #[test]
    fn test_subscribers_see_every_pool() {
        let mut registry: PoolRegistry<Fx, Particle> = PoolRegistry::new();
        let events = registry.subscribe();
        registry
            .create_pool(proto(Fx::Spark), PoolConfig::new(1, 1, false), false)
            .unwrap();
        let id = registry.get(&Fx::Spark).unwrap();

        let seen: Vec<_> = events.try_iter().collect();
        assert_eq!(
            seen,
            vec![
                LifecycleEvent::PoolCreated { pool: Fx::Spark },
                LifecycleEvent::ObjectCreated { pool: Fx::Spark, instance: id },
                LifecycleEvent::ObjectSpawned { pool: Fx::Spark, instance: id },
            ]
        );
    }

    #[test]
    fn test_expand_pool_through_registry() {
        let mut registry = registry_with(Fx::Spark, PoolConfig::new(5, 8, false));
        assert_eq!(registry.expand_pool(&Fx::Spark, 10).unwrap(), 3);
        assert_eq!(registry.finish_pending_creation(), 3);
        assert_eq!(registry.get_stats(&Fx::Spark).unwrap().total, 8);
        assert!(matches!(
            registry.expand_pool(&Fx::Smoke, 1),
            Err(PoolError::UnknownKey(_))
        ));
    }
}
