//! # Pool Error Types
//!
//! Every failure the pooling engine can report. None of them are fatal:
//! callers receive them as values and decide on a fallback.

use thiserror::Error;

/// Errors reported by pools and the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// No available instance and growth is disabled or the pool is at its cap.
    #[error("pool {pool} exhausted: {total} of {max} instances in use")]
    Exhausted {
        /// The pool that ran dry.
        pool: String,
        /// Instances the pool owns.
        total: usize,
        /// The pool's hard cap.
        max: usize,
    },

    /// The pool is uninitialized or still prewarming with nothing to hand out.
    #[error("pool {0} is not ready")]
    NotReady(String),

    /// No pool is registered under the key.
    #[error("no pool registered for key {0}")]
    UnknownKey(String),

    /// The instance handle does not belong to this pool (or is stale).
    #[error("instance {instance} does not belong to pool {pool}")]
    ForeignInstance {
        /// The pool the return was attempted on.
        pool: String,
        /// Debug rendering of the handle.
        instance: String,
    },

    /// The instance is already sitting in the available queue.
    #[error("instance {instance} is already available in pool {pool}")]
    AlreadyAvailable {
        /// The owning pool.
        pool: String,
        /// Debug rendering of the handle.
        instance: String,
    },

    /// The registry has no record of handing out this instance.
    #[error("instance {0} is not tracked by the registry")]
    NotTracked(String),

    /// The requested parent/child link is not allowed.
    #[error("cannot attach {child} under {parent}")]
    InvalidAttachment {
        /// Debug rendering of the child handle.
        child: String,
        /// Debug rendering of the parent handle.
        parent: String,
    },

    /// The pool configuration is unusable.
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// The prototype stamps instances for a different key than the pool's.
    #[error("prototype key {prototype} does not match pool key {pool}")]
    PrototypeMismatch {
        /// The pool's key.
        pool: String,
        /// The key the prototype reported.
        prototype: String,
    },
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
