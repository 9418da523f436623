//! # Fixed-Step Loop
//!
//! Fixed-timestep driver for the simulation.
//!
//! Time can be fed from the wall clock (real-time runs) or in whole
//! simulated chunks (headless runs and tests); either way the simulation
//! only ever advances by exactly one tick duration at a time.

use std::time::{Duration, Instant};

/// Fixed-timestep accumulator.
pub struct FixedStep {
    /// Target tick duration.
    tick_duration: Duration,
    /// Wall-clock time of the last sample.
    last_sample: Instant,
    /// Time fed but not yet consumed by ticks.
    accumulator: Duration,
    /// Total ticks executed.
    tick_count: u64,
    /// Frame time statistics.
    stats: StepStats,
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepStats {
    /// Minimum tick duration observed.
    pub min_tick_us: u64,
    /// Maximum tick duration observed.
    pub max_tick_us: u64,
    /// Average tick duration (rolling).
    pub avg_tick_us: u64,
    /// Ticks that took longer than their budget.
    pub late_ticks: u64,
    /// Total ticks measured.
    pub total_ticks: u64,
}

impl StepStats {
    fn fresh(tick_duration: Duration) -> Self {
        Self {
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            avg_tick_us: micros(tick_duration),
            late_ticks: 0,
            total_ticks: 0,
        }
    }
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

impl FixedStep {
    /// Creates a loop ticking `tick_rate` times per simulated second.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let tick_duration = Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)));
        Self {
            tick_duration,
            last_sample: Instant::now(),
            accumulator: Duration::ZERO,
            tick_count: 0,
            stats: StepStats::fresh(tick_duration),
        }
    }

    /// Adds simulated time to the accumulator.
    pub fn feed(&mut self, elapsed: Duration) {
        self.accumulator += elapsed;
    }

    /// Adds the wall-clock time since the previous sample.
    pub fn sample_wall_clock(&mut self) {
        let now = Instant::now();
        self.accumulator += now.duration_since(self.last_sample);
        self.last_sample = now;
    }

    /// Returns true if a whole tick is waiting in the accumulator.
    #[must_use]
    pub fn should_tick(&self) -> bool {
        self.accumulator >= self.tick_duration
    }

    /// Consumes one tick from the accumulator.
    ///
    /// Returns the tick start time for duration measurement.
    #[must_use]
    pub fn begin_tick(&mut self) -> Instant {
        self.accumulator = self.accumulator.saturating_sub(self.tick_duration);
        self.tick_count += 1;
        Instant::now()
    }

    /// Records how long the tick started at `start` took.
    pub fn end_tick(&mut self, start: Instant) {
        let duration = start.elapsed();
        let duration_us = micros(duration);

        self.stats.total_ticks += 1;
        self.stats.min_tick_us = self.stats.min_tick_us.min(duration_us);
        self.stats.max_tick_us = self.stats.max_tick_us.max(duration_us);
        self.stats.avg_tick_us = (self.stats.avg_tick_us * 15 + duration_us) / 16;

        if duration > self.tick_duration {
            self.stats.late_ticks += 1;
        }
    }

    /// Sleeps until the next tick is due on the wall clock.
    pub fn wait_for_next_tick(&self) {
        let elapsed = self.last_sample.elapsed();
        if elapsed < self.tick_duration {
            std::thread::sleep(self.tick_duration - elapsed);
        }
    }

    /// Total ticks executed.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Simulated time covered by the executed ticks.
    #[must_use]
    pub fn simulated_time(&self) -> Duration {
        self.tick_duration * u32::try_from(self.tick_count).unwrap_or(u32::MAX)
    }

    /// Tick timing statistics.
    #[must_use]
    pub const fn stats(&self) -> &StepStats {
        &self.stats
    }

    /// The target tick duration.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }
}

impl Default for FixedStep {
    fn default() -> Self {
        Self::new(respawn_shared::TICK_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_creation() {
        let step = FixedStep::new(60);
        assert_eq!(step.tick_count(), 0);
        assert_eq!(step.tick_duration(), Duration::from_micros(16666));
        assert!(!step.should_tick());
    }

    #[test]
    fn test_fed_time_yields_whole_ticks() {
        let mut step = FixedStep::new(100);
        step.feed(Duration::from_millis(35));

        let mut ticks = 0;
        while step.should_tick() {
            let start = step.begin_tick();
            step.end_tick(start);
            ticks += 1;
        }
        assert_eq!(ticks, 3);
        assert_eq!(step.stats().total_ticks, 3);
        assert_eq!(step.simulated_time(), Duration::from_millis(30));

        step.feed(Duration::from_millis(5));
        assert!(step.should_tick());
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        let step = FixedStep::new(0);
        assert_eq!(step.tick_duration(), Duration::from_secs(1));
    }
}
