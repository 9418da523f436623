//! # Prototypes
//!
//! A prototype is the immutable template a pool stamps instances from.
//! Its key is the pool key, so one prototype family maps to one pool.

use std::fmt::Debug;
use std::hash::Hash;

/// Bound satisfied by every usable pool key.
///
/// Closed enums make the best keys: a missing pool becomes a variant the
/// compiler knows about instead of a misspelled string.
pub trait PoolKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<K> PoolKey for K where K: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Template from which pooled instances of type `T` are stamped.
pub trait Prototype<K, T> {
    /// Stable identity of this prototype family, used as the pool key.
    fn key(&self) -> K;

    /// Creates one new instance in its default state.
    fn instantiate(&self) -> T;
}

/// Prototype built from a key and a factory closure.
///
/// Useful for small pools (effects, projectiles) that don't warrant their
/// own prototype type.
pub struct FnPrototype<K, F> {
    key: K,
    factory: F,
}

impl<K, F> FnPrototype<K, F> {
    /// Creates a prototype that calls `factory` for every new instance.
    pub const fn new(key: K, factory: F) -> Self {
        Self { key, factory }
    }
}

impl<K, T, F> Prototype<K, T> for FnPrototype<K, F>
where
    K: Clone,
    F: Fn() -> T,
{
    fn key(&self) -> K {
        self.key.clone()
    }

    fn instantiate(&self) -> T {
        (self.factory)()
    }
}
