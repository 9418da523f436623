//! # RESPAWN
//!
//! Horde simulation built on the RESPAWN pooling stack: three levels, each
//! with its own actor pools, sharing one controller pool.
//!
//! ## Example
//!
//! ```rust,ignore
//! use respawn::{HordeSim, SimSettings, DEFAULT_CONFIG};
//!
//! let config = SpawnerConfig::from_toml_str(DEFAULT_CONFIG)?;
//! let mut sim = HordeSim::new(&config, SimSettings::default())?;
//! sim.advance(Duration::from_secs(60));
//! println!("{:?}", sim.report());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod horde;
pub mod sim;
pub mod step;

pub use horde::{catalog, BodyPrototype, HordeBody, HordeKey, LevelType};
pub use sim::{spawn_ring, HordeCoordinator, HordeSim, SimReport, SimSettings, Tally, DEFAULT_CONFIG};
pub use step::{FixedStep, StepStats};
