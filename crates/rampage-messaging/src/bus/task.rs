//! Task strategy: one tokio task per (subscriber, message), chained.
//!
//! Every delivery becomes its own task. Each subscriber keeps the completion
//! signal of its most recent task; a new task waits for that signal before
//! running its handler, which keeps deliveries to one subscriber in publish
//! order while tasks for different subscribers run freely. Handlers are
//! synchronous, so they run on the blocking pool.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::watch;

use super::{delegate_to_core, MessageBus};
use crate::config::{BusConfig, Strategy};
use crate::error::{MessagingError, Result};
use crate::message::{Envelope, Message};
use crate::shared::BusCore;
use crate::subscription::Subscription;

/// Completion signal of the latest delivery scheduled for one subscriber
#[derive(Debug, Default)]
pub(crate) struct Chain {
    tail: Mutex<Option<watch::Receiver<bool>>>,
}

/// Completion handle for one publish on a [`TaskMessageBus`]
///
/// Resolves once every handler the message was handed to has finished. A
/// handler that never returns keeps its delivery pending forever.
#[derive(Debug)]
#[must_use = "a Delivery does nothing unless awaited or inspected"]
pub struct Delivery {
    pending: Vec<watch::Receiver<bool>>,
}

impl Delivery {
    fn empty() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Number of subscribers the message was handed to
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the message had no subscribers
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether every delivery has finished
    pub fn is_complete(&self) -> bool {
        self.pending.iter().all(|done| *done.borrow())
    }

    /// Wait until every delivery has finished
    pub fn completed(self) -> impl Future<Output = ()> + Send {
        async move {
            for done in self.pending {
                finished(done).await;
            }
        }
    }
}

/// Resolves once the signal reads `true` or its task is gone.
async fn finished(mut done: watch::Receiver<bool>) {
    while !*done.borrow_and_update() {
        if done.changed().await.is_err() {
            return;
        }
    }
}

/// Bus that schedules every delivery as an asynchronous task
///
/// Runs on the ambient tokio runtime when created inside one, otherwise on a
/// runtime owned by the bus. `publish` returns as soon as the tasks are
/// scheduled; [`TaskMessageBus::publish_with_completion`] also returns a
/// [`Delivery`] to await.
///
/// On a current-thread runtime the delivery tasks only advance while that
/// thread is yielding to the scheduler. A publisher that blocks the thread
/// synchronously (for example waiting on a std channel for a handler) never
/// sees those deliveries run. Await [`Delivery::completed`] instead, or build
/// the bus outside the runtime so it owns a multi-thread one.
pub struct TaskMessageBus {
    core: Arc<BusCore<Chain>>,
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
}

impl TaskMessageBus {
    /// Create a new task bus with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(&BusConfig::for_strategy(Strategy::Task))
    }

    /// Create a new task bus, building a runtime sized by
    /// `config.worker_threads` if none is running
    ///
    /// Inside a running runtime the bus joins it, and `worker_threads` and
    /// `thread_name` do not apply.
    pub fn with_config(config: &BusConfig) -> Result<Self> {
        if let Ok(handle) = Handle::try_current() {
            tracing::debug!(
                worker_threads = config.worker_threads,
                thread_name = %config.thread_name,
                flavor = ?handle.runtime_flavor(),
                "Task bus joining the ambient runtime; its thread settings apply"
            );
            return Ok(Self::with_handle(handle));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(config.effective_worker_threads())
            .thread_name(format!("{}-task", config.thread_name))
            .enable_all()
            .build()
            .map_err(MessagingError::Runtime)?;
        tracing::debug!("Task bus started its own runtime");

        Ok(Self {
            core: BusCore::new(Strategy::Task),
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
        })
    }

    /// Create a new task bus that schedules onto an existing runtime
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            core: BusCore::new(Strategy::Task),
            handle,
            runtime: Mutex::new(None),
        }
    }

    /// Publish a message and get a handle that resolves when every handler
    /// for it has finished
    pub fn publish_with_completion<T: Message>(&self, message: T) -> Result<Delivery> {
        let Some((envelope, targets)) = self.core.prepare(message)? else {
            return Ok(Delivery::empty());
        };

        let pending = targets
            .iter()
            .map(|subscription| self.chain(subscription, envelope.clone()))
            .collect();
        Ok(Delivery { pending })
    }

    fn chain(
        &self,
        subscription: &Arc<Subscription<Chain>>,
        envelope: Envelope,
    ) -> watch::Receiver<bool> {
        let (done_tx, done_rx) = watch::channel(false);
        let previous = subscription.slot.tail.lock().replace(done_rx.clone());

        let core = Arc::clone(&self.core);
        let subscription = Arc::clone(subscription);
        self.handle.spawn(async move {
            if let Some(previous) = previous {
                finished(previous).await;
            }

            let id = subscription.id();
            let invoked =
                tokio::task::spawn_blocking(move || core.invoke(&subscription, &envelope)).await;
            if let Err(e) = invoked {
                tracing::error!("Delivery task for {} did not complete: {}", id, e);
            }
            let _ = done_tx.send(true);
        });

        done_rx
    }
}

impl MessageBus for TaskMessageBus {
    delegate_to_core!();

    fn publish<T: Message>(&self, message: T) -> Result<usize> {
        self.publish_with_completion(message)
            .map(|delivery| delivery.len())
    }

    fn dispose(&self) {
        self.core.dispose();
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for TaskMessageBus {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for TaskMessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskMessageBus")
            .field("core", &self.core)
            .field("owns_runtime", &self.runtime.lock().is_some())
            .finish()
    }
}
