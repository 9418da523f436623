//! # RESPAWN Shared
//!
//! Common types used by the pooling core, the spawner and the demo binary.
//!
//! ## Rule
//!
//! This crate must stay free of pooling logic. It only carries the math
//! types a pooled instance is reset to and the default tuning values.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod math;

pub use constants::{
    DEFAULT_CREATION_BATCH, DEFAULT_INITIAL_SIZE, DEFAULT_MAX_SIZE, TICK_RATE,
};
pub use math::{Quaternion, Transform, Vec3};
