//! Worker-pool strategy with one FIFO mailbox per subscriber.
//!
//! Publishing appends the message to the mailbox of every resolved
//! subscriber. A mailbox has at most one drain job on the pool at any time,
//! which delivers queued messages one by one and retires when the mailbox is
//! empty. Different subscribers drain concurrently; one subscriber never sees
//! two of its messages at once or out of order.
//!
//! Drains run on the blocking pool of a runtime owned by the bus. That pool
//! grows while every thread is busy, so any number of stalled handlers each
//! pin one thread and never hold back another subscriber's mailbox.

use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

use super::{delegate_to_core, MessageBus};
use crate::config::{BusConfig, Strategy};
use crate::error::{MessagingError, Result};
use crate::message::{Envelope, Message};
use crate::shared::BusCore;
use crate::subscription::Subscription;

#[derive(Debug, Default)]
struct MailboxState {
    queue: VecDeque<Envelope>,
    scheduled: bool,
}

/// Pending deliveries for one subscriber
#[derive(Debug, Default)]
pub(crate) struct Mailbox {
    state: Mutex<MailboxState>,
}

impl Mailbox {
    /// Queue a message. Returns true when the caller must schedule a drain.
    fn push(&self, envelope: Envelope) -> bool {
        let mut state = self.state.lock();
        state.queue.push_back(envelope);
        !std::mem::replace(&mut state.scheduled, true)
    }

    /// Next message to deliver, or `None` after un-scheduling an empty box.
    fn next(&self) -> Option<Envelope> {
        let mut state = self.state.lock();
        let next = state.queue.pop_front();
        if next.is_none() {
            state.scheduled = false;
        }
        next
    }

    fn len(&self) -> usize {
        self.state.lock().queue.len()
    }
}

fn drain(core: &BusCore<Mailbox>, subscription: &Subscription<Mailbox>) {
    while let Some(envelope) = subscription.slot.next() {
        core.invoke(subscription, &envelope);
    }
}

/// Idle drain threads above the warm set retire after this long.
const IDLE_KEEP_ALIVE: Duration = Duration::from_secs(10);

/// Bus that dispatches to a worker pool, serialized per subscriber
///
/// `publish` never waits for handlers. A stalled handler occupies one worker
/// and holds back only its own subscriber's mailbox; the pool adds workers
/// rather than queue other mailboxes behind it.
pub struct ParallelMessageBus {
    core: Arc<BusCore<Mailbox>>,
    runtime: RwLock<Option<Runtime>>,
}

impl ParallelMessageBus {
    /// Create a new pool-backed bus with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(&BusConfig::for_strategy(Strategy::Parallel))
    }

    /// Create a new pool-backed bus
    ///
    /// `config.worker_threads` sizes the scheduler; drain workers are added
    /// on demand and named `{thread_name}-worker-{n}`.
    pub fn with_config(config: &BusConfig) -> Result<Self> {
        let prefix = config.thread_name.clone();
        let threads = config.effective_worker_threads();
        let next = AtomicUsize::new(0);
        let runtime = Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name_fn(move || {
                format!("{}-worker-{}", prefix, next.fetch_add(1, Ordering::Relaxed))
            })
            .thread_keep_alive(IDLE_KEEP_ALIVE)
            .build()
            .map_err(MessagingError::Runtime)?;
        tracing::debug!("Parallel bus started with {} workers", threads);

        Ok(Self {
            core: BusCore::new(Strategy::Parallel),
            runtime: RwLock::new(Some(runtime)),
        })
    }

    /// Messages queued but not yet handed to handlers, across all subscribers
    pub fn pending(&self) -> usize {
        let mut pending = 0;
        self.core.for_each_subscription(|subscription| {
            pending += subscription.slot.len();
        });
        pending
    }
}

impl MessageBus for ParallelMessageBus {
    delegate_to_core!();

    fn publish<T: Message>(&self, message: T) -> Result<usize> {
        let Some((envelope, targets)) = self.core.prepare(message)? else {
            return Ok(0);
        };

        let runtime = self.runtime.read();
        let runtime = runtime.as_ref().ok_or(MessagingError::Disposed)?;
        for subscription in targets.iter() {
            if subscription.slot.push(envelope.clone()) {
                let core = Arc::clone(&self.core);
                let subscription = Arc::clone(subscription);
                runtime.spawn_blocking(move || drain(&core, &subscription));
            }
        }
        Ok(targets.len())
    }

    fn dispose(&self) {
        self.core.dispose();
        // Running handlers finish on detached threads; anything still queued
        // is skipped because every subscription is now inactive.
        if let Some(runtime) = self.runtime.write().take() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for ParallelMessageBus {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ParallelMessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelMessageBus")
            .field("core", &self.core)
            .field("running", &self.runtime.read().is_some())
            .field("pending", &self.pending())
            .finish()
    }
}
