//! # RESPAWN Core
//!
//! Object pooling engine for entities that are spawned and despawned at
//! high frequency.
//!
//! ## Architecture Rules
//!
//! 1. **No allocation spikes** - populations are prewarmed a few instances
//!    per tick, never in one burst
//! 2. **Handles, not references** - callers hold [`InstanceId`]s; the pool
//!    owns every instance for its whole life
//! 3. **Absorb and log** - misuse (double returns, foreign handles) is
//!    reported and logged, never a panic
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use respawn_core::{FnPrototype, PoolConfig, PoolRegistry, Poolable};
//!
//! #[derive(Default)]
//! struct Bullet;
//! impl Poolable for Bullet {}
//!
//! let mut registry: PoolRegistry<&str, Bullet> = PoolRegistry::new();
//! registry
//!     .create_pool(
//!         Arc::new(FnPrototype::new("bullet", Bullet::default)),
//!         PoolConfig::new(8, 32, true),
//!         true,
//!     )
//!     .unwrap();
//! registry.finish_pending_creation();
//!
//! let id = registry.get(&"bullet").unwrap();
//! registry.return_instance(id).unwrap();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod event;
pub mod instance;
pub mod pool;
pub mod prototype;
pub mod registry;
pub mod schedule;

pub use error::{PoolError, PoolResult};
pub use event::{EventBus, LifecycleEvent};
pub use instance::{InstanceId, InstanceState, Motion, Parent, Poolable, Pooled};
pub use pool::{CreationProgress, Pool, PoolConfig, PoolStats, PoolStatus};
pub use prototype::{FnPrototype, PoolKey, Prototype};
pub use registry::PoolRegistry;
pub use schedule::{CancellationToken, Scheduler};
