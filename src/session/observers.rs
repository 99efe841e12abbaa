//! Identity change subscribers.

use std::sync::{Arc, Mutex, Weak};

use super::types::Identity;

type Callback = Arc<dyn Fn(Option<&Identity>) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    /// Kept in registration order.
    entries: Vec<(u64, Callback)>,
}

/// Ordered list of identity-change callbacks.
#[derive(Default)]
pub(crate) struct Observers {
    registry: Arc<Mutex<Registry>>,
}

impl Observers {
    pub(crate) fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&Identity>) + Send + Sync + 'static,
    {
        let mut registry = self
            .registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push((id, Arc::new(callback)));

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Invoke every callback in registration order.
    ///
    /// The registry lock is released before callbacks run, so a callback may
    /// subscribe, unsubscribe or read session state.
    pub(crate) fn notify(&self, identity: Option<&Identity>) {
        let callbacks: Vec<Callback> = {
            let registry = self
                .registry
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            registry.entries.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };

        for callback in callbacks {
            callback(identity);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.registry
            .lock()
            .map(|r| r.entries.len())
            .unwrap_or(0)
    }
}

/// Handle returned by `subscribe`. Dropping it keeps the subscription alive.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Stop receiving notifications. Returns false if already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = registry.entries.len();
        registry.entries.retain(|(id, _)| *id != self.id);
        registry.entries.len() != before
    }
}
