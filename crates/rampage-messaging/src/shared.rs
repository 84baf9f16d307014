//! Strategy-independent half of every bus: registration, exact-type
//! resolution, lifecycle and counters. Strategies only decide when and on
//! which thread [`BusCore::invoke`] runs.

use std::any::TypeId;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::config::Strategy;
use crate::error::{MessagingError, Result};
use crate::message::{Envelope, Message};
use crate::registry::{Registry, Snapshot};
use crate::stats::{BusStats, Counters};
use crate::subscription::{Subscription, SubscriptionId, Unsubscribe};

pub(crate) struct BusCore<S> {
    strategy: Strategy,
    registry: Registry<S>,
    disposed: AtomicBool,
    counters: Counters,
}

impl<S> BusCore<S>
where
    S: Default + Send + Sync + 'static,
{
    pub(crate) fn new(strategy: Strategy) -> Arc<Self> {
        Arc::new(Self {
            strategy,
            registry: Registry::new(),
            disposed: AtomicBool::new(false),
            counters: Counters::default(),
        })
    }

    pub(crate) fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub(crate) fn subscribe<T, F>(self: &Arc<Self>, handler: F) -> Result<Unsubscribe>
    where
        T: Message,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.ensure_open("subscribe")?;

        let subscription = Arc::new(Subscription::new::<T, F>(handler, S::default()));
        let id = self.registry.add(TypeId::of::<T>(), subscription);

        let core: Weak<Self> = Arc::downgrade(self);
        Ok(Unsubscribe::new(
            id,
            Arc::new(move |id: SubscriptionId| {
                core.upgrade().is_some_and(|core| core.unsubscribe(id))
            }),
        ))
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.remove(id)
    }

    /// Accept a message for publication and resolve its recipients.
    ///
    /// `Ok(None)` means nobody is subscribed to the message's exact type.
    pub(crate) fn prepare<T: Message>(
        &self,
        message: T,
    ) -> Result<Option<(Envelope, Snapshot<S>)>> {
        self.ensure_open("publish")?;
        self.counters.record_publish();

        let envelope = Envelope::new(message);
        match self.registry.resolve(envelope.type_id()) {
            Some(targets) => {
                tracing::trace!(
                    "[{}] publishing {} to {} subscriber(s)",
                    self.strategy,
                    envelope.type_name(),
                    targets.len()
                );
                Ok(Some((envelope, targets)))
            }
            None => {
                tracing::trace!(
                    "[{}] no subscribers for {}",
                    self.strategy,
                    envelope.type_name()
                );
                Ok(None)
            }
        }
    }

    /// Resolve recipients for a batch of messages of one type.
    pub(crate) fn prepare_batch<T, I>(
        &self,
        messages: I,
    ) -> Result<(Vec<Envelope>, Option<Snapshot<S>>)>
    where
        T: Message,
        I: IntoIterator<Item = T>,
    {
        self.ensure_open("publish")?;

        let envelopes: Vec<Envelope> = messages
            .into_iter()
            .map(|message| {
                self.counters.record_publish();
                Envelope::new(message)
            })
            .collect();
        Ok((envelopes, self.registry.resolve(TypeId::of::<T>())))
    }

    pub(crate) fn invoke(&self, subscription: &Subscription<S>, envelope: &Envelope) {
        let outcome = subscription.invoke(envelope);
        self.counters.record(outcome);
    }

    /// Returns true on the first call only.
    pub(crate) fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.registry.clear();
        tracing::debug!("[{}] message bus disposed", self.strategy);
        true
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub(crate) fn for_each_subscription(&self, visit: impl FnMut(&Arc<Subscription<S>>)) {
        self.registry.for_each(visit);
    }

    pub(crate) fn stats(&self) -> BusStats {
        self.counters.snapshot(self.registry.len())
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.is_disposed() {
            tracing::warn!("[{}] {} rejected: bus disposed", self.strategy, operation);
            return Err(MessagingError::Disposed);
        }
        Ok(())
    }
}

impl<S> fmt::Debug for BusCore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusCore")
            .field("strategy", &self.strategy)
            .field("disposed", &self.disposed.load(Ordering::Relaxed))
            .field("subscribers", &self.registry.len())
            .finish()
    }
}
