//! # Spawn Coordinator
//!
//! Composes two pool tiers into spawnable pairs: a logic **controller** and a
//! visual **actor** attached under it. Actor pools are grouped into
//! categories; each spawn draws one actor uniformly from the category.
//!
//! ## Pair Lifecycle
//!
//! ```text
//! spawn ─► Active ─┬─► Expired ──────────┐
//!                  ├─► ManuallyReturned ─┼─► Returned
//!                  └─► Forced ───────────┘
//! ```
//!
//! Everything time-based (expiry, maintenance, the spawn loop) is a job on
//! the coordinator's scheduler, advanced by [`SpawnCoordinator::tick`].

use crossbeam_channel::Receiver;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use respawn_core::{
    CancellationToken, EventBus, InstanceId, Motion, PoolError, PoolKey, PoolRegistry,
    PoolStats, Poolable, Scheduler,
};
use respawn_shared::{Transform, Vec3};
use std::collections::HashMap;
use std::time::Duration;

use crate::catalog::PrototypeCatalog;
use crate::config::{SpawnSettings, SpawnerConfig};
use crate::error::{SpawnError, SpawnResult};
use crate::pair::{ActivePair, PairId, ReturnReason, SpawnEvent, SpawnedPair};
use crate::stats::StatsBoard;

/// Return rules of one actor pool.
#[derive(Clone, Copy, Debug)]
struct ActorRules {
    reset_on_return: bool,
    auto_return_on_expiry: bool,
}

#[derive(Clone, Copy, Debug)]
enum Job {
    Expire { controller: InstanceId, pair: PairId },
    Maintenance,
    SpawnWave,
}

struct SpawnLoop<C> {
    category: C,
    points: Vec<Vec3>,
    token: CancellationToken,
}

/// Two-tier spawner over a [`PoolRegistry`].
///
/// `K` keys pools, `C` tags categories, `T` is the pooled type shared by
/// controllers and actors.
pub struct SpawnCoordinator<K, C, T> {
    registry: PoolRegistry<K, T>,
    settings: SpawnSettings,
    categories: HashMap<C, Vec<K>>,
    /// Categories in config order.
    category_order: Vec<C>,
    actor_rules: HashMap<K, ActorRules>,
    controller_key: Option<K>,
    /// Live pairs by controller.
    active: HashMap<InstanceId, ActivePair<K, C>>,
    next_pair: u64,
    jobs: Scheduler<Job>,
    /// Cancelled on shutdown; every expiry and maintenance job carries it.
    lifetime: CancellationToken,
    spawn_loop: Option<SpawnLoop<C>>,
    rng: ChaCha8Rng,
    board: StatsBoard<K>,
    events: EventBus<SpawnEvent<K, C>>,
    initialized: bool,
    ready: bool,
}

impl<K: PoolKey, C: PoolKey, T: Poolable> SpawnCoordinator<K, C, T> {
    /// Creates an uninitialized coordinator with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let settings = SpawnSettings::default();
        Self {
            registry: PoolRegistry::new(),
            rng: ChaCha8Rng::seed_from_u64(settings.seed),
            settings,
            categories: HashMap::new(),
            category_order: Vec::new(),
            actor_rules: HashMap::new(),
            controller_key: None,
            active: HashMap::new(),
            next_pair: 1,
            jobs: Scheduler::new(),
            lifetime: CancellationToken::new(),
            spawn_loop: None,
            board: StatsBoard::new(),
            events: EventBus::new(),
            initialized: false,
            ready: false,
        }
    }

    /// Builds the controller pool and one pool per category entry.
    ///
    /// Prewarm starts immediately and completes over the following ticks;
    /// [`SpawnEvent::PoolsReady`] is published when every pool is ready.
    /// Category entries whose prototype is not in the catalog are logged and
    /// skipped. Re-initializing shuts the previous setup down first.
    ///
    /// # Errors
    ///
    /// - [`SpawnError::Config`] if the configuration fails validation.
    /// - [`SpawnError::MissingPrototype`] if the controller prototype is not
    ///   in the catalog.
    /// - [`SpawnError::Pool`] if a pool rejects its configuration.
    pub fn initialize(
        &mut self,
        config: &SpawnerConfig<C>,
        catalog: &PrototypeCatalog<K, T>,
    ) -> SpawnResult<()> {
        config.validate()?;

        if self.initialized {
            tracing::warn!("re-initializing spawn coordinator");
            self.shutdown();
        }
        self.registry.clear_all_pools();
        self.categories.clear();
        self.category_order.clear();
        self.actor_rules.clear();
        self.active.clear();
        self.jobs.clear();
        self.controller_key = None;
        self.ready = false;

        let batch = config.settings.creation_batch;
        let Some(controller) = catalog.resolve(&config.controller.prototype) else {
            tracing::error!(
                prototype = %config.controller.prototype,
                "controller prototype not found"
            );
            return Err(SpawnError::MissingPrototype(
                config.controller.prototype.clone(),
            ));
        };
        let controller_key = controller.key();
        self.registry
            .create_pool(controller, config.controller.pool_config(batch), true)?;

        for entry in &config.categories {
            let Some(prototype) = catalog.resolve(&entry.prototype) else {
                tracing::warn!(
                    category = ?entry.category,
                    prototype = %entry.prototype,
                    "actor prototype not found, skipping"
                );
                continue;
            };
            let key = prototype.key();
            if key == controller_key {
                tracing::warn!(
                    category = ?entry.category,
                    prototype = %entry.prototype,
                    "actor prototype resolves to the controller pool, skipping"
                );
                continue;
            }

            self.registry
                .create_pool(prototype, entry.pool_config(batch), true)?;

            if !self.categories.contains_key(&entry.category) {
                self.category_order.push(entry.category.clone());
            }
            let keys = self.categories.entry(entry.category.clone()).or_default();
            if !keys.contains(&key) {
                keys.push(key.clone());
            }
            self.actor_rules.entry(key).or_insert(ActorRules {
                reset_on_return: entry.reset_on_return,
                auto_return_on_expiry: entry.auto_return_on_expiry,
            });
        }

        self.settings = config.settings.clone();
        self.rng = ChaCha8Rng::seed_from_u64(self.settings.seed);
        self.lifetime = CancellationToken::new();
        self.controller_key = Some(controller_key);
        self.jobs.schedule_after(
            self.settings.maintenance_interval(),
            Job::Maintenance,
            self.lifetime.clone(),
        );
        self.initialized = true;

        tracing::info!(
            categories = self.category_order.len(),
            pools = self.registry.pool_count(),
            max_active = ?self.settings.max_active,
            "spawn coordinator initialized"
        );
        Ok(())
    }

    /// Advances pools, timers, maintenance and the spawn loop by `dt`.
    ///
    /// Pairs broken up outside the coordinator are purged first.
    pub fn tick(&mut self, dt: Duration) {
        self.registry.tick(dt);
        self.purge_stale();

        if self.initialized && !self.ready && self.pools_ready() {
            self.ready = true;
            tracing::info!("all pools ready");
            self.events.emit(SpawnEvent::PoolsReady);
        }

        for job in self.jobs.advance(dt) {
            match job {
                Job::Expire { controller, pair } => self.expire(controller, pair),
                Job::Maintenance => {
                    self.report_stats();
                    self.jobs.schedule_after(
                        self.settings.maintenance_interval(),
                        Job::Maintenance,
                        self.lifetime.clone(),
                    );
                }
                Job::SpawnWave => self.spawn_wave(),
            }
        }
    }

    fn pools_ready(&self) -> bool {
        self.controller_key
            .as_ref()
            .is_some_and(|key| self.registry.is_ready(key))
            && self.actor_rules.keys().all(|key| self.registry.is_ready(key))
    }

    /// Draws an actor uniformly from the category's pools.
    ///
    /// # Errors
    ///
    /// [`SpawnError::NotInitialized`], [`SpawnError::UnknownCategory`], or
    /// the pool's refusal.
    pub fn get_random_actor(&mut self, category: &C) -> SpawnResult<InstanceId> {
        self.draw_actor(category).map(|(_, actor)| actor)
    }

    fn draw_actor(&mut self, category: &C) -> SpawnResult<(K, InstanceId)> {
        if !self.initialized {
            return Err(SpawnError::NotInitialized);
        }
        let key = match self.categories.get(category) {
            Some(keys) if !keys.is_empty() => keys[self.rng.gen_range(0..keys.len())].clone(),
            _ => {
                tracing::warn!(category = ?category, "no actor pools for category");
                return Err(SpawnError::UnknownCategory(format!("{category:?}")));
            }
        };
        let actor = self.registry.get(&key)?;
        Ok((key, actor))
    }

    /// Takes a controller from the controller pool.
    ///
    /// # Errors
    ///
    /// [`SpawnError::NotInitialized`] or the pool's refusal.
    pub fn get_controller(&mut self) -> SpawnResult<InstanceId> {
        if !self.initialized {
            return Err(SpawnError::NotInitialized);
        }
        let Some(key) = self.controller_key.clone() else {
            return Err(SpawnError::NotInitialized);
        };
        Ok(self.registry.get(&key)?)
    }

    /// Returns an actor, zeroing its motion if its pool asks for it.
    ///
    /// If the actor belongs to an active pair, the whole pair is released
    /// as manually returned.
    ///
    /// # Errors
    ///
    /// [`PoolError::NotTracked`] (wrapped) if the actor is not handed out.
    pub fn return_actor(&mut self, actor: InstanceId) -> SpawnResult<()> {
        let owner = self
            .active
            .values()
            .find(|entry| entry.actor == actor)
            .map(|entry| entry.controller);
        if let Some(controller) = owner {
            if self.is_linked(controller, actor) {
                self.recycle_controller(controller, ReturnReason::Manual)?;
                return Ok(());
            }
        }
        self.release_actor(actor)
    }

    fn release_actor(&mut self, actor: InstanceId) -> SpawnResult<()> {
        let Some(key) = self.registry.owner_of(actor).cloned() else {
            tracing::warn!(instance = %actor, "returning an actor that is not tracked");
            return Err(PoolError::NotTracked(actor.to_string()).into());
        };
        let reset = self
            .actor_rules
            .get(&key)
            .map_or(true, |rules| rules.reset_on_return);
        if reset {
            if let Some(node) = self.registry.instance_mut(actor) {
                node.motion = Motion::REST;
            }
        }
        self.registry.return_instance(actor)?;
        Ok(())
    }

    /// Returns a controller with every actor attached under it.
    ///
    /// If the controller belongs to an active pair, the pair is released as
    /// manually returned.
    ///
    /// # Errors
    ///
    /// Whatever the registry reports for the controller itself; failures on
    /// attached actors are logged and skipped.
    pub fn return_controller(&mut self, controller: InstanceId) -> SpawnResult<()> {
        self.recycle_controller(controller, ReturnReason::Manual)?;
        Ok(())
    }

    fn recycle_controller(
        &mut self,
        controller: InstanceId,
        reason: ReturnReason,
    ) -> SpawnResult<Option<PairId>> {
        for child in self.registry.children(controller) {
            if let Err(err) = self.release_actor(child) {
                tracing::warn!(%controller, %child, %err, "failed to return attached actor");
            }
        }
        if let Some(node) = self.registry.instance_mut(controller) {
            node.transform = Transform::IDENTITY;
            node.motion = Motion::REST;
        }

        let released = self.active.remove(&controller).map(|entry| entry.pair);
        let result = self.registry.return_instance(controller);
        if let Some(pair) = released {
            tracing::debug!(%pair, ?reason, "pair returned");
            self.events.emit(SpawnEvent::PairReturned { pair, reason });
        }
        result?;
        Ok(released)
    }

    /// Spawns an actor + controller pair at `position`.
    ///
    /// # Errors
    ///
    /// - [`SpawnError::AtCapacity`] when the active cap is reached. This is
    ///   backpressure: try again after a pair is returned.
    /// - [`SpawnError::NotInitialized`], [`SpawnError::UnknownCategory`], or a
    ///   pool refusal. Nothing is left handed out on failure.
    pub fn spawn(&mut self, category: &C, position: Vec3) -> SpawnResult<SpawnedPair> {
        if !self.initialized {
            return Err(SpawnError::NotInitialized);
        }

        self.purge_stale();
        if let Some(max) = self.settings.max_active {
            let active = self.active.len();
            if active >= max {
                tracing::debug!(active, max, "active cap reached, skipping spawn");
                return Err(SpawnError::AtCapacity { active, max });
            }
        }

        let (actor_key, actor) = self.draw_actor(category)?;
        let controller = match self.get_controller() {
            Ok(controller) => controller,
            Err(err) => {
                tracing::warn!(%err, "no controller available, returning actor");
                self.discard(actor);
                return Err(err);
            }
        };
        if let Err(err) = self.registry.attach(actor, controller) {
            self.discard(actor);
            self.discard(controller);
            return Err(err.into());
        }
        if let Some(node) = self.registry.instance_mut(controller) {
            node.transform = Transform::at(position);
        }

        let pair = PairId::new(self.next_pair);
        self.next_pair += 1;
        self.active.insert(
            controller,
            ActivePair {
                pair,
                controller,
                actor,
                category: category.clone(),
                actor_key: actor_key.clone(),
                spawned_at: self.jobs.now(),
            },
        );

        let expires = self
            .actor_rules
            .get(&actor_key)
            .is_some_and(|rules| rules.auto_return_on_expiry);
        if let (Some(lifetime), true) = (self.settings.lifetime(), expires) {
            self.jobs.schedule_after(
                lifetime,
                Job::Expire { controller, pair },
                self.lifetime.clone(),
            );
        }

        tracing::debug!(%pair, category = ?category, %actor, %controller, "pair spawned");
        self.events.emit(SpawnEvent::PairSpawned {
            pair,
            category: category.clone(),
            actor_key,
            controller,
            actor,
        });
        Ok(SpawnedPair {
            pair,
            controller,
            actor,
        })
    }

    fn discard(&mut self, id: InstanceId) {
        if let Err(err) = self.registry.return_instance(id) {
            tracing::warn!(instance = %id, %err, "failed to roll back instance");
        }
    }

    /// True while both halves are handed out and the actor still hangs
    /// under the controller.
    fn is_linked(&self, controller: InstanceId, actor: InstanceId) -> bool {
        self.registry.is_tracked(controller)
            && self.registry.is_tracked(actor)
            && self.registry.children(controller).contains(&actor)
    }

    /// Drops pairs broken up behind the coordinator's back.
    ///
    /// A controller left behind by an actor that went back on its own is
    /// returned as well, as long as nothing else hangs under it.
    fn purge_stale(&mut self) {
        let mut stale: Vec<(PairId, InstanceId, InstanceId)> = self
            .active
            .values()
            .filter(|entry| !self.is_linked(entry.controller, entry.actor))
            .map(|entry| (entry.pair, entry.controller, entry.actor))
            .collect();
        stale.sort_unstable_by_key(|(pair, ..)| *pair);

        for (_, controller, actor) in stale {
            let Some(entry) = self.active.remove(&controller) else {
                continue;
            };
            let orphaned = self.registry.is_tracked(controller)
                && !self.registry.is_tracked(actor)
                && self.registry.children(controller).is_empty();
            if orphaned {
                if let Some(node) = self.registry.instance_mut(controller) {
                    node.transform = Transform::IDENTITY;
                    node.motion = Motion::REST;
                }
                self.discard(controller);
            } else {
                tracing::warn!(pair = %entry.pair, %controller, %actor, "pair broken up outside the coordinator");
            }
            tracing::debug!(pair = %entry.pair, "purged stale pair");
            self.events.emit(SpawnEvent::PairReturned {
                pair: entry.pair,
                reason: ReturnReason::Manual,
            });
        }
    }

    /// Returns an active pair by its controller.
    ///
    /// # Errors
    ///
    /// [`SpawnError::NotActive`] if the controller is not part of an active
    /// pair, otherwise as [`SpawnCoordinator::return_controller`].
    pub fn despawn(&mut self, controller: InstanceId) -> SpawnResult<PairId> {
        self.purge_stale();
        if !self.active.contains_key(&controller) {
            return Err(SpawnError::NotActive(controller.to_string()));
        }
        self.recycle_controller(controller, ReturnReason::Manual)?
            .ok_or_else(|| SpawnError::NotActive(controller.to_string()))
    }

    fn expire(&mut self, controller: InstanceId, pair: PairId) {
        let current = self.active.get(&controller).map(|entry| entry.pair);
        if current != Some(pair) {
            tracing::trace!(%pair, "expiry for a pair that is no longer active");
            return;
        }
        if let Err(err) = self.recycle_controller(controller, ReturnReason::Expired) {
            tracing::warn!(%pair, %err, "failed to expire pair");
        }
    }

    /// Returns every active pair. Returns how many were released.
    pub fn force_return_all(&mut self) -> usize {
        let controllers: Vec<InstanceId> = self.active.keys().copied().collect();
        let mut returned = 0;
        for controller in controllers {
            match self.recycle_controller(controller, ReturnReason::Forced) {
                Ok(_) => returned += 1,
                Err(err) => {
                    tracing::warn!(%controller, %err, "failed to force return pair");
                }
            }
        }
        if returned > 0 {
            tracing::info!(returned, "force returned active pairs");
        }
        returned
    }

    /// Starts spawning one pair every spawn interval at a random point.
    ///
    /// Attempts are skipped until pools are ready and while the cap is
    /// reached. With no points, pairs spawn at the origin. Replaces any
    /// running loop.
    ///
    /// # Errors
    ///
    /// [`SpawnError::NotInitialized`] or [`SpawnError::UnknownCategory`].
    pub fn start_spawn_loop(&mut self, category: C, points: Vec<Vec3>) -> SpawnResult<()> {
        if !self.initialized {
            return Err(SpawnError::NotInitialized);
        }
        if !self.categories.contains_key(&category) {
            return Err(SpawnError::UnknownCategory(format!("{category:?}")));
        }

        self.stop_spawn_loop();
        let token = CancellationToken::new();
        self.jobs.schedule_next_tick(Job::SpawnWave, token.clone());
        tracing::info!(category = ?category, points = points.len(), "spawn loop started");
        self.spawn_loop = Some(SpawnLoop {
            category,
            points,
            token,
        });
        Ok(())
    }

    /// Stops the spawn loop, if running.
    pub fn stop_spawn_loop(&mut self) {
        if let Some(spawn_loop) = self.spawn_loop.take() {
            spawn_loop.token.cancel();
            tracing::info!(category = ?spawn_loop.category, "spawn loop stopped");
        }
    }

    /// Returns true while the spawn loop runs.
    #[must_use]
    pub fn is_spawning(&self) -> bool {
        self.spawn_loop.is_some()
    }

    fn spawn_wave(&mut self) {
        let Some(spawn_loop) = self.spawn_loop.as_ref() else {
            return;
        };
        let token = spawn_loop.token.clone();
        if token.is_cancelled() {
            return;
        }
        let category = spawn_loop.category.clone();
        let position = if spawn_loop.points.is_empty() {
            Vec3::ZERO
        } else {
            spawn_loop.points[self.rng.gen_range(0..spawn_loop.points.len())]
        };

        if self.ready {
            match self.spawn(&category, position) {
                Ok(_) | Err(SpawnError::AtCapacity { .. }) => {}
                Err(err) => tracing::debug!(%err, "spawn loop attempt failed"),
            }
        }
        self.jobs
            .schedule_after(self.settings.spawn_interval(), Job::SpawnWave, token);
    }

    fn report_stats(&mut self) {
        let pools = self.all_stats();
        let active = self.active.len();
        self.board.publish(self.jobs.now(), active, pools.clone());

        if self.settings.enable_pool_stats {
            tracing::info!(active, pools = pools.len(), "pool maintenance report");
            for stats in &pools {
                tracing::info!(
                    pool = ?stats.key,
                    available = stats.available,
                    total = stats.total,
                    in_use = stats.in_use(),
                    "pool stats"
                );
            }
        }
        self.events.emit(SpawnEvent::StatsReport(pools));
    }

    /// Stats of every pool: category pools in config order, then the
    /// controller pool.
    #[must_use]
    pub fn all_stats(&self) -> Vec<PoolStats<K>> {
        let mut keys: Vec<&K> = Vec::new();
        for category in &self.category_order {
            for key in self.categories.get(category).into_iter().flatten() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        let mut stats: Vec<PoolStats<K>> = keys
            .into_iter()
            .filter_map(|key| self.registry.get_stats(key))
            .collect();
        if let Some(key) = &self.controller_key {
            stats.extend(self.registry.get_stats(key));
        }
        stats
    }

    /// Schedules `additional` more instances for an actor pool.
    ///
    /// # Errors
    ///
    /// [`PoolError::UnknownKey`] (wrapped) if no such pool exists.
    pub fn expand_actor_pool(&mut self, key: &K, additional: usize) -> SpawnResult<usize> {
        Ok(self.registry.expand_pool(key, additional)?)
    }

    /// Stops every timer and the spawn loop, then returns every active pair.
    ///
    /// Pools are kept; call [`SpawnCoordinator::initialize`] to start over.
    pub fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        self.lifetime.cancel();
        self.stop_spawn_loop();
        let returned = self.force_return_all();
        self.jobs.clear();
        self.initialized = false;
        self.ready = false;
        tracing::info!(returned, "spawn coordinator shut down");
    }

    /// Subscribes to spawn events.
    pub fn subscribe(&mut self) -> Receiver<SpawnEvent<K, C>> {
        self.events.subscribe()
    }

    /// Handle to the shared stats board.
    #[must_use]
    pub fn stats_board(&self) -> StatsBoard<K> {
        self.board.clone()
    }

    /// The underlying registry.
    #[must_use]
    pub fn registry(&self) -> &PoolRegistry<K, T> {
        &self.registry
    }

    /// The underlying registry, mutably.
    pub fn registry_mut(&mut self) -> &mut PoolRegistry<K, T> {
        &mut self.registry
    }

    /// Active settings.
    #[must_use]
    pub fn settings(&self) -> &SpawnSettings {
        &self.settings
    }

    /// Active pair for a controller.
    #[must_use]
    pub fn pair(&self, controller: InstanceId) -> Option<&ActivePair<K, C>> {
        self.active.get(&controller)
    }

    /// Every active pair, in no particular order.
    pub fn active_pairs(&self) -> impl Iterator<Item = &ActivePair<K, C>> {
        self.active.values()
    }

    /// Number of active pairs.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Actor pool keys of a category.
    #[must_use]
    pub fn category_keys(&self, category: &C) -> &[K] {
        self.categories
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Key of the controller pool.
    #[must_use]
    pub fn controller_key(&self) -> Option<&K> {
        self.controller_key.as_ref()
    }

    /// Returns true once every pool finished prewarming.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Returns true between `initialize` and `shutdown`.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Coordinator time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.jobs.now()
    }
}

impl<K: PoolKey, C: PoolKey, T: Poolable> Default for SpawnCoordinator<K, C, T> {
    fn default() -> Self {
        Self::new()
    }
}
