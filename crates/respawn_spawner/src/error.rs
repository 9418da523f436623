//! # Spawner Error Types

use respawn_core::PoolError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating spawner configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A numeric field is outside its allowed range.
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        /// Offending field, qualified by its table.
        field: String,
        /// Value found.
        value: usize,
        /// Smallest allowed value.
        min: usize,
        /// Largest allowed value.
        max: usize,
    },

    /// Fields that are individually fine but contradict each other.
    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

/// Errors raised by the spawn coordinator.
#[derive(Error, Debug)]
pub enum SpawnError {
    /// The coordinator has not been initialized (or was shut down).
    #[error("spawn coordinator not initialized")]
    NotInitialized,

    /// No actor pool is registered for the category.
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// The active population cap is reached. Backpressure, not a failure.
    #[error("active cap reached: {active}/{max}")]
    AtCapacity {
        /// Active pairs.
        active: usize,
        /// Configured cap.
        max: usize,
    },

    /// The controller is not part of an active pair.
    #[error("no active pair for controller {0}")]
    NotActive(String),

    /// A prototype named by the config is not in the catalog.
    #[error("prototype not found: {0}")]
    MissingPrototype(String),

    /// A pool operation failed.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for spawner operations.
pub type SpawnResult<T> = Result<T, SpawnError>;
