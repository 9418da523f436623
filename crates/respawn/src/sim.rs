//! # Horde Simulation
//!
//! Drives a [`SpawnCoordinator`] through a fixed-step loop and plays the
//! part of gameplay: spawned controllers walk toward the arena center and
//! their actors take random hits until they die and are despawned.

use crossbeam_channel::Receiver;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use respawn_core::{InstanceId, PoolStats};
use respawn_shared::Vec3;
use respawn_spawner::{
    PairId, ReturnReason, SpawnCoordinator, SpawnEvent, SpawnResult, SpawnerConfig, StatsBoard,
};
use std::time::Duration;

use crate::horde::{catalog, HordeBody, HordeKey, LevelType};
use crate::step::FixedStep;

/// Bundled default configuration.
pub const DEFAULT_CONFIG: &str = include_str!("../data/horde.toml");

/// Coordinator type used by the demo.
pub type HordeCoordinator = SpawnCoordinator<HordeKey, LevelType, HordeBody>;

/// Gameplay tuning of the simulation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimSettings {
    /// Level whose category the spawn loop draws from.
    pub level: LevelType,
    /// Fixed ticks per simulated second.
    pub tick_rate: u32,
    /// Chance per tick that an active actor is hit.
    pub hit_chance: f64,
    /// Damage range of a hit.
    pub damage: (u32, u32),
    /// Walking speed of controllers, units per second.
    pub walk_speed: f32,
    /// Seed of the gameplay RNG.
    pub seed: u64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            level: LevelType::Farm,
            tick_rate: respawn_shared::TICK_RATE,
            hit_chance: 0.02,
            damage: (5, 25),
            walk_speed: 2.5,
            seed: 1,
        }
    }
}

impl SimSettings {
    /// Clamps the hit chance into `[0, 1]`; a NaN chance disables hits.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.hit_chance = if self.hit_chance.is_nan() {
            0.0
        } else {
            self.hit_chance.clamp(0.0, 1.0)
        };
        self
    }
}

/// Counters of what happened to pairs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    /// Pairs spawned.
    pub spawned: u64,
    /// Pairs killed by gameplay.
    pub killed: u64,
    /// Pairs returned by their lifetime timer.
    pub expired: u64,
    /// Pairs swept at shutdown.
    pub forced: u64,
    /// Maintenance reports seen.
    pub reports: u64,
}

/// End-of-run summary.
#[derive(Clone, Debug, PartialEq)]
pub struct SimReport {
    /// Pair counters.
    pub tally: Tally,
    /// Pairs still active.
    pub active: usize,
    /// Highest active count seen after any tick.
    pub peak_active: usize,
    /// Ticks executed.
    pub ticks: u64,
    /// Pool populations at report time.
    pub pools: Vec<PoolStats<HordeKey>>,
}

/// Spawn points on a ring around the arena center.
#[must_use]
pub fn spawn_ring(count: usize, radius: f32) -> Vec<Vec3> {
    (0..count)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let angle = std::f32::consts::TAU * i as f32 / count.max(1) as f32;
            Vec3::new(radius * angle.cos(), 0.0, radius * angle.sin())
        })
        .collect()
}

/// The horde simulation.
pub struct HordeSim {
    coordinator: HordeCoordinator,
    step: FixedStep,
    settings: SimSettings,
    rng: ChaCha8Rng,
    events: Receiver<SpawnEvent<HordeKey, LevelType>>,
    tally: Tally,
    peak_active: usize,
}

impl HordeSim {
    /// Initializes the coordinator and starts the spawn loop for the level.
    ///
    /// # Errors
    ///
    /// Whatever [`SpawnCoordinator::initialize`] or
    /// [`SpawnCoordinator::start_spawn_loop`] reports.
    pub fn new(config: &SpawnerConfig<LevelType>, settings: SimSettings) -> SpawnResult<Self> {
        let settings = settings.sanitized();
        let mut coordinator = HordeCoordinator::new();
        let events = coordinator.subscribe();
        coordinator.initialize(config, &catalog())?;
        coordinator.start_spawn_loop(settings.level, spawn_ring(8, 25.0))?;

        tracing::info!(level = %settings.level, tick_rate = settings.tick_rate, "horde simulation ready");
        Ok(Self {
            coordinator,
            step: FixedStep::new(settings.tick_rate),
            settings,
            rng: ChaCha8Rng::seed_from_u64(settings.seed),
            events,
            tally: Tally::default(),
            peak_active: 0,
        })
    }

    /// Runs every whole tick contained in `elapsed`. Returns ticks run.
    pub fn advance(&mut self, elapsed: Duration) -> u64 {
        self.step.feed(elapsed);
        self.drain_due_ticks()
    }

    /// Runs every tick the wall clock says is due. Returns ticks run.
    pub fn advance_realtime(&mut self) -> u64 {
        self.step.wait_for_next_tick();
        self.step.sample_wall_clock();
        self.drain_due_ticks()
    }

    fn drain_due_ticks(&mut self) -> u64 {
        let mut ran = 0;
        while self.step.should_tick() {
            let start = self.step.begin_tick();
            self.tick();
            self.step.end_tick(start);
            ran += 1;
        }
        ran
    }

    fn tick(&mut self) {
        let dt = self.step.tick_duration();
        self.coordinator.tick(dt);
        self.walk(dt);
        self.fight();
        self.drain_events();
        self.peak_active = self.peak_active.max(self.coordinator.active_count());
    }

    fn walk(&mut self, dt: Duration) {
        let controllers: Vec<InstanceId> = self
            .coordinator
            .active_pairs()
            .map(|pair| pair.controller)
            .collect();
        let registry = self.coordinator.registry_mut();
        for controller in controllers {
            if let Some(node) = registry.instance_mut(controller) {
                node.transform.position = node.transform.position + node.motion.linear * dt.as_secs_f32();
            }
        }
    }

    fn fight(&mut self) {
        let mut pairs: Vec<(PairId, InstanceId, InstanceId)> = self
            .coordinator
            .active_pairs()
            .map(|pair| (pair.pair, pair.controller, pair.actor))
            .collect();
        // Spawn order keeps the RNG stream reproducible.
        pairs.sort_unstable_by_key(|(pair, ..)| *pair);

        let (low, high) = self.settings.damage;
        let mut dead = Vec::new();
        for (_, controller, actor) in pairs {
            if !self.rng.gen_bool(self.settings.hit_chance) {
                continue;
            }
            let damage = self.rng.gen_range(low..=high.max(low));
            let lethal = self
                .coordinator
                .registry_mut()
                .instance_mut(actor)
                .is_some_and(|node| node.value_mut().hit(damage));
            if lethal {
                dead.push(controller);
            }
        }

        for controller in dead {
            match self.coordinator.despawn(controller) {
                Ok(pair) => {
                    self.tally.killed += 1;
                    tracing::debug!(%pair, "killed");
                }
                Err(err) => tracing::warn!(%controller, %err, "failed to despawn dead pair"),
            }
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                SpawnEvent::PairSpawned { controller, .. } => {
                    self.tally.spawned += 1;
                    self.aim_at_center(controller);
                }
                SpawnEvent::PairReturned { reason, .. } => match reason {
                    ReturnReason::Expired => self.tally.expired += 1,
                    ReturnReason::Forced => self.tally.forced += 1,
                    ReturnReason::Manual => {}
                },
                SpawnEvent::StatsReport(_) => self.tally.reports += 1,
                SpawnEvent::PoolsReady => tracing::info!("horde pools ready"),
            }
        }
    }

    fn aim_at_center(&mut self, controller: InstanceId) {
        let speed = self.settings.walk_speed;
        let Some(node) = self.coordinator.registry_mut().instance_mut(controller) else {
            return;
        };
        let to_center = Vec3::ZERO - node.transform.position;
        let distance = to_center.length_squared().sqrt();
        if distance > f32::EPSILON {
            node.motion.linear = to_center * (speed / distance);
        }
    }

    /// Stops spawning and returns every active pair.
    pub fn shutdown(&mut self) {
        self.coordinator.shutdown();
        self.drain_events();
    }

    /// Summary of the run so far.
    #[must_use]
    pub fn report(&self) -> SimReport {
        SimReport {
            tally: self.tally,
            active: self.coordinator.active_count(),
            peak_active: self.peak_active,
            ticks: self.step.tick_count(),
            pools: self.coordinator.all_stats(),
        }
    }

    /// The coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &HordeCoordinator {
        &self.coordinator
    }

    /// Shared stats board of the coordinator.
    #[must_use]
    pub fn stats_board(&self) -> StatsBoard<HordeKey> {
        self.coordinator.stats_board()
    }

    /// Fixed-step timing.
    #[must_use]
    pub fn step(&self) -> &FixedStep {
        &self.step
    }
}
