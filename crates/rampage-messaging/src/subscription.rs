//! Subscriptions, their identifiers, and cancellation handles.

use parking_lot::ReentrantMutex;
use std::any::{type_name, Any};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::message::{Envelope, Message};

/// Subscription handle used to cancel a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new unique subscription ID
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// Handler erased over its message type. Returns `false` when the envelope
/// does not hold the type the handler was registered for.
type ErasedHandler = Box<dyn Fn(&Envelope) -> bool + Send + Sync>;

/// Result of handing one message to one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Invocation {
    /// The handler ran to completion.
    Delivered,
    /// The subscription was cancelled (or the type did not match); the
    /// handler was not called.
    Skipped,
    /// The handler panicked. The panic was contained.
    Faulted,
}

/// One registered interest: an exact message type and its handler.
///
/// `S` is per-subscriber scheduling state owned by the dispatch strategy
/// (a mailbox, a task chain, or nothing at all).
pub struct Subscription<S> {
    id: SubscriptionId,
    message_type: &'static str,
    active: AtomicBool,
    /// Serializes deliveries to this subscriber. Reentrant so a handler may
    /// publish to its own type on strategies that dispatch inline.
    invocation: ReentrantMutex<()>,
    handler: ErasedHandler,
    pub(crate) slot: S,
}

impl<S> Subscription<S> {
    pub(crate) fn new<T, F>(handler: F, slot: S) -> Self
    where
        T: Message,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let handler: ErasedHandler =
            Box::new(move |envelope: &Envelope| match envelope.downcast_ref::<T>() {
                Some(message) => {
                    handler(message);
                    true
                }
                None => false,
            });

        Self {
            id: SubscriptionId::new(),
            message_type: type_name::<T>(),
            active: AtomicBool::new(true),
            invocation: ReentrantMutex::new(()),
            handler,
            slot,
        }
    }

    /// Token identifying this subscription
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Rust type name of the message this subscription accepts
    pub fn message_type(&self) -> &'static str {
        self.message_type
    }

    /// Whether the subscription still receives messages
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mark the subscription cancelled. Returns `true` on the first call only.
    pub(crate) fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    /// Run the handler for one message.
    ///
    /// The active flag is checked after the invocation lock is taken, so a
    /// delivery queued before cancellation but not yet started is dropped.
    pub(crate) fn invoke(&self, envelope: &Envelope) -> Invocation {
        let _guard = self.invocation.lock();
        if !self.is_active() {
            return Invocation::Skipped;
        }

        match panic::catch_unwind(AssertUnwindSafe(|| (self.handler)(envelope))) {
            Ok(true) => Invocation::Delivered,
            // Guard only: the registry routes by the same TypeId the handler
            // was erased with, so buses never hand over a foreign type.
            Ok(false) => {
                tracing::warn!(
                    "Subscription {} expects {} but was handed {}",
                    self.id,
                    self.message_type,
                    envelope.type_name()
                );
                Invocation::Skipped
            }
            Err(payload) => {
                tracing::error!(
                    subscription = %self.id,
                    message_type = envelope.type_name(),
                    "Handler panicked: {}",
                    panic_message(payload.as_ref())
                );
                Invocation::Faulted
            }
        }
    }
}

impl<S> fmt::Debug for Subscription<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("message_type", &self.message_type)
            .field("active", &self.is_active())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

type CancelFn = Arc<dyn Fn(SubscriptionId) -> bool + Send + Sync>;

/// Cancellation handle returned by `subscribe`.
///
/// Calling [`Unsubscribe::unsubscribe`] any number of times is safe; only the
/// first call has an effect. Dropping the handle does not cancel anything.
#[derive(Clone)]
pub struct Unsubscribe {
    id: SubscriptionId,
    cancel: CancelFn,
}

impl Unsubscribe {
    pub(crate) fn new(id: SubscriptionId, cancel: CancelFn) -> Self {
        Self { id, cancel }
    }

    /// Token of the subscription this handle cancels
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Cancel the subscription
    ///
    /// Returns true if this call removed it.
    pub fn unsubscribe(&self) -> bool {
        (self.cancel)(self.id)
    }

    /// Convert into a plain zero-argument cancellation closure
    pub fn into_fn(self) -> impl Fn() + Send + Sync + 'static {
        move || {
            self.unsubscribe();
        }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Unsubscribe").field(&self.id).finish()
    }
}
