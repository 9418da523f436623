//! # Tuning Constants
//!
//! Default values for pools, the controller tier and the spawner.
//! Everything here can be overridden through configuration.

// =============================================================================
// POOL DEFAULTS
// =============================================================================

/// Instances created per scheduler tick while prewarming or expanding.
pub const DEFAULT_CREATION_BATCH: usize = 5;

/// Default number of instances created by prewarm.
pub const DEFAULT_INITIAL_SIZE: usize = 10;

/// Default hard cap on instances per pool.
pub const DEFAULT_MAX_SIZE: usize = 100;

// =============================================================================
// CONTROLLER TIER
// =============================================================================

/// Controllers prewarmed at coordinator startup.
pub const CONTROLLER_INITIAL_SIZE: usize = 20;

/// Hard cap on controllers.
pub const CONTROLLER_MAX_SIZE: usize = 50;

// =============================================================================
// CATEGORY LIMITS (validated when configuration is loaded)
// =============================================================================

/// Allowed range for a category's initial pool size.
pub const INITIAL_POOL_SIZE_RANGE: (usize, usize) = (5, 50);

/// Allowed range for a category's maximum pool size.
pub const MAX_POOL_SIZE_RANGE: (usize, usize) = (10, 100);

/// Default initial size of a category pool.
pub const CATEGORY_INITIAL_SIZE: usize = 10;

/// Default maximum size of a category pool.
pub const CATEGORY_MAX_SIZE: usize = 30;

// =============================================================================
// SPAWNER TIMING
// =============================================================================

/// Simulation tick rate (updates per second).
pub const TICK_RATE: u32 = 60;

/// Seconds between spawn attempts of the spawn loop.
pub const SPAWN_INTERVAL_SECS: f32 = 0.2;

/// Seconds between maintenance stat reports.
pub const MAINTENANCE_INTERVAL_SECS: f32 = 30.0;

/// Default actor lifetime when auto-expiry is enabled.
pub const DEFAULT_LIFETIME_SECS: f32 = 30.0;

/// Longest configurable interval or lifetime (one week).
pub const MAX_TIMER_SECS: f32 = 604_800.0;
