//! Subscription registry keyed by exact message type.
//!
//! Each message type maps to a copy-on-write list of subscriptions. Resolving
//! a type hands out the current list as an immutable snapshot; adding or
//! removing a subscription rebuilds the list, so a snapshot held by an
//! in-flight publish never changes underneath it.

use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::subscription::{Subscription, SubscriptionId};

/// Ordered, immutable view of the subscriptions for one message type
pub type Snapshot<S> = Arc<Vec<Arc<Subscription<S>>>>;

#[derive(Debug)]
struct Entries<S> {
    by_type: HashMap<TypeId, Snapshot<S>>,
    types: HashMap<SubscriptionId, TypeId>,
}

/// Registry of live subscriptions
#[derive(Debug)]
pub struct Registry<S> {
    entries: RwLock<Entries<S>>,
}

impl<S> Registry<S> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Entries {
                by_type: HashMap::new(),
                types: HashMap::new(),
            }),
        }
    }

    /// Register a subscription for `message_type`, after any existing ones
    pub fn add(&self, message_type: TypeId, subscription: Arc<Subscription<S>>) -> SubscriptionId {
        let id = subscription.id();
        let mut entries = self.entries.write();
        let list = entries.by_type.entry(message_type).or_default();
        Arc::make_mut(list).push(subscription);
        entries.types.insert(id, message_type);
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Cancel and unlink a subscription
    ///
    /// Returns true if the subscription was found and removed. Unknown or
    /// already-removed ids are ignored.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        let Some(message_type) = entries.types.remove(&id) else {
            return false;
        };

        let mut emptied = false;
        if let Some(list) = entries.by_type.get_mut(&message_type) {
            let list = Arc::make_mut(list);
            if let Some(pos) = list.iter().position(|sub| sub.id() == id) {
                list[pos].deactivate();
                list.remove(pos);
            }
            emptied = list.is_empty();
        }
        if emptied {
            entries.by_type.remove(&message_type);
        }

        tracing::debug!("Subscription {} removed", id);
        true
    }

    /// Snapshot of the active subscriptions for exactly `message_type`, in
    /// subscription order
    pub fn resolve(&self, message_type: TypeId) -> Option<Snapshot<S>> {
        self.entries.read().by_type.get(&message_type).cloned()
    }

    /// Visit every live subscription
    pub fn for_each(&self, mut visit: impl FnMut(&Arc<Subscription<S>>)) {
        let entries = self.entries.read();
        for list in entries.by_type.values() {
            list.iter().for_each(&mut visit);
        }
    }

    /// Number of live subscriptions across all types
    pub fn len(&self) -> usize {
        self.entries.read().types.len()
    }

    /// Whether no subscriptions are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel and drop every subscription
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        for list in entries.by_type.values() {
            for sub in list.iter() {
                sub.deactivate();
            }
        }
        entries.by_type.clear();
        entries.types.clear();
    }
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}
