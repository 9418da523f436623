//! # Prototype Catalog
//!
//! Maps the prototype names used in configuration files to prototype values.

use respawn_core::Prototype;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared prototype handle.
pub type SharedPrototype<K, T> = Arc<dyn Prototype<K, T>>;

/// Name → prototype lookup used when the coordinator starts.
pub struct PrototypeCatalog<K, T> {
    entries: HashMap<String, SharedPrototype<K, T>>,
}

impl<K, T> PrototypeCatalog<K, T> {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registers `prototype` under `name`, returning any prototype it replaces.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        prototype: SharedPrototype<K, T>,
    ) -> Option<SharedPrototype<K, T>> {
        let name = name.into();
        let previous = self.entries.insert(name.clone(), prototype);
        if previous.is_some() {
            tracing::warn!(%name, "prototype name registered twice, keeping the newer one");
        }
        previous
    }

    /// Builder form of [`PrototypeCatalog::register`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, prototype: SharedPrototype<K, T>) -> Self {
        self.register(name, prototype);
        self
    }

    /// Looks a prototype up by name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<SharedPrototype<K, T>> {
        self.entries.get(name).cloned()
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered prototypes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, T> Default for PrototypeCatalog<K, T> {
    fn default() -> Self {
        Self::new()
    }
}
