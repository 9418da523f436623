//! # Pooled Instances
//!
//! Instances are owned by their pool. Callers hold an [`InstanceId`]:
//! - Lower 32 bits: slot index inside the pool
//! - Upper 32 bits: the pool epoch that minted it
//!
//! A pool receives a fresh epoch every time it is initialized, so handles
//! minted before a `clear()` can never address the rebuilt population.

use respawn_shared::{Transform, Vec3};
use std::fmt;

/// Handle to one pooled instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Creates an instance handle from slot index and pool epoch.
    #[inline]
    #[must_use]
    pub const fn new(slot: u32, epoch: u32) -> Self {
        Self(((epoch as u64) << 32) | (slot as u64))
    }

    /// Returns the slot portion of the handle.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> u32 {
        self.0 as u32
    }

    /// Returns the epoch portion of the handle.
    #[inline]
    #[must_use]
    pub const fn epoch(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw packed value, handy for logs and hashing into external tables.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot(), self.epoch())
    }
}

/// The two transient states of a pooled instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstanceState {
    /// Sitting in the pool's available queue.
    Available,
    /// Handed out by `get()` and not yet returned.
    InUse,
}

/// Where an instance hangs in the scene hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Parent {
    /// The owning pool's storage scope. Every available instance lives here.
    Storage,
    /// Attached under another live instance.
    Instance(InstanceId),
    /// Loose in the world. Handed-out instances start here.
    World,
}

/// Physics state a coordinator zeroes when an instance is recycled.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Motion {
    /// Linear velocity.
    pub linear: Vec3,
    /// Angular velocity.
    pub angular: Vec3,
}

impl Motion {
    /// No movement at all.
    pub const REST: Self = Self {
        linear: Vec3::ZERO,
        angular: Vec3::ZERO,
    };

    /// Returns true if both velocities are zero.
    #[must_use]
    pub fn is_at_rest(&self) -> bool {
        *self == Self::REST
    }
}

/// Capability hooks for pooled types.
///
/// Both methods default to no-ops, so a type that needs no bookkeeping just
/// writes `impl Poolable for MyType {}`.
pub trait Poolable {
    /// Called right after the instance is handed out, before the caller
    /// touches it.
    fn on_get_from_pool(&mut self) {}

    /// Called right before the instance is pushed back to the available
    /// queue.
    fn on_return_to_pool(&mut self) {}
}

/// A pooled value together with its scene state.
#[derive(Debug)]
pub struct Pooled<T> {
    value: T,
    /// Local transform relative to [`Pooled::parent`].
    pub transform: Transform,
    /// Physics state.
    pub motion: Motion,
    active: bool,
    parent: Parent,
    children: Vec<InstanceId>,
}

impl<T> Pooled<T> {
    /// Wraps a freshly stamped value in its inert state.
    pub(crate) fn new(value: T) -> Self {
        Self {
            value,
            transform: Transform::IDENTITY,
            motion: Motion::REST,
            active: false,
            parent: Parent::Storage,
            children: Vec::new(),
        }
    }

    /// The pooled value.
    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// The pooled value, mutably.
    #[inline]
    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// Whether the instance is enabled (handed out).
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Current parent scope.
    #[inline]
    #[must_use]
    pub const fn parent(&self) -> Parent {
        self.parent
    }

    /// Instances attached under this one.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[InstanceId] {
        &self.children
    }

    /// Returns true if the instance is in the canonical inert state.
    #[must_use]
    pub fn is_inert(&self) -> bool {
        !self.active
            && self.parent == Parent::Storage
            && self.transform.is_identity()
            && self.children.is_empty()
    }

    /// Enables the instance and moves it out of storage into the world.
    pub(crate) fn activate(&mut self) {
        self.active = true;
        self.parent = Parent::World;
    }

    /// Deactivates, reparents to storage, zeroes the local transform.
    pub(crate) fn reset_inert(&mut self) {
        self.active = false;
        self.parent = Parent::Storage;
        self.transform = Transform::IDENTITY;
        self.children.clear();
    }

    pub(crate) fn set_parent(&mut self, parent: Parent) {
        self.parent = parent;
    }

    pub(crate) fn add_child(&mut self, child: InstanceId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub(crate) fn remove_child(&mut self, child: InstanceId) {
        self.children.retain(|c| *c != child);
    }

    pub(crate) fn retain_children(&mut self, keep: impl FnMut(&InstanceId) -> bool) {
        self.children.retain(keep);
    }

    pub(crate) fn take_children(&mut self) -> Vec<InstanceId> {
        std::mem::take(&mut self.children)
    }
}
