//! # RESPAWN Spawner
//!
//! Spawn coordination on top of the pooling core.
//!
//! ## Modules
//!
//! - [`config`]: category/controller configuration, loaded from TOML
//! - [`catalog`]: prototype names to prototype values
//! - [`coordinator`]: controller + actor pairs, caps, expiry, maintenance
//! - [`pair`]: pair identities and spawn events
//! - [`stats`]: the cross-thread stats board
//!
//! ## Example
//!
//! ```rust,ignore
//! let config = SpawnerConfig::<Level>::load("data/horde.toml")?;
//! let mut coordinator = SpawnCoordinator::new();
//! coordinator.initialize(&config, &catalog)?;
//!
//! loop {
//!     coordinator.tick(frame_time);
//!     // ...
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod pair;
pub mod stats;

pub use catalog::{PrototypeCatalog, SharedPrototype};
pub use config::{CategoryConfig, ControllerConfig, SpawnSettings, SpawnerConfig};
pub use coordinator::SpawnCoordinator;
pub use error::{ConfigError, SpawnError, SpawnResult};
pub use pair::{ActivePair, PairId, ReturnReason, SpawnEvent, SpawnedPair};
pub use stats::{StatsBoard, StatsSnapshot};
