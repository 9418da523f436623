//! # Lifecycle Events
//!
//! Pools and the registry publish what happens to instances over
//! crossbeam channels. Subscribers drain their receiver on their own tick,
//! so a handler can never re-enter `get()`/`return_instance()` while a pool
//! is halfway through mutating its queues.

use crossbeam_channel::{Receiver, Sender};

use crate::instance::InstanceId;

/// Notification emitted by pools and the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleEvent<K> {
    /// A new instance was stamped from the prototype.
    ObjectCreated {
        /// Owning pool.
        pool: K,
        /// The new instance.
        instance: InstanceId,
    },
    /// An instance was handed out by `get()`.
    ObjectSpawned {
        /// Owning pool.
        pool: K,
        /// The instance handed out.
        instance: InstanceId,
    },
    /// An instance went back to the available queue.
    ObjectReturned {
        /// Owning pool.
        pool: K,
        /// The instance returned.
        instance: InstanceId,
    },
    /// Prewarm finished.
    PoolPrewarmed {
        /// The pool.
        pool: K,
        /// Instances owned after prewarm.
        total: usize,
    },
    /// The registry registered a new pool.
    PoolCreated {
        /// The pool.
        pool: K,
    },
    /// A pool destroyed its whole population.
    PoolCleared {
        /// The pool.
        pool: K,
        /// Instances destroyed.
        destroyed: usize,
    },
}

/// Fan-out of events to any number of channel subscribers.
///
/// Subscribers whose receiver was dropped are pruned on the next emit.
#[derive(Debug)]
pub struct EventBus<E> {
    sinks: Vec<Sender<E>>,
}

impl<E: Clone> EventBus<E> {
    /// Creates a bus with no subscribers.
    #[must_use]
    pub const fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Registers a new unbounded subscriber.
    pub fn subscribe(&mut self) -> Receiver<E> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.sinks.push(sender);
        receiver
    }

    /// Registers an existing sender as a subscriber.
    pub fn add_sink(&mut self, sink: Sender<E>) {
        self.sinks.push(sink);
    }

    /// Current subscriber senders.
    #[must_use]
    pub fn sinks(&self) -> &[Sender<E>] {
        &self.sinks
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sinks.len()
    }

    /// Sends `event` to every subscriber (non-blocking).
    pub fn emit(&mut self, event: E) {
        if self.sinks.is_empty() {
            return;
        }
        self.sinks.retain(|sink| sink.send(event.clone()).is_ok());
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out_and_prune() {
        let mut bus: EventBus<u32> = EventBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.emit(1);
        assert_eq!(first.try_recv(), Ok(1));
        assert_eq!(second.try_recv(), Ok(1));

        drop(second);
        bus.emit(2);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(first.try_recv(), Ok(2));
    }
}
