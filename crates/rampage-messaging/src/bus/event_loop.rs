//! Event-loop strategy: a single background thread drains an ordered queue.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;

use super::{delegate_to_core, MessageBus};
use crate::config::{BusConfig, Strategy};
use crate::error::{MessagingError, Result};
use crate::message::{Envelope, Message};
use crate::registry::Snapshot;
use crate::shared::BusCore;

/// One publish: the message and the subscribers resolved for it
struct Job {
    envelope: Envelope,
    targets: Snapshot<()>,
}

/// Bus that hands deliveries to one dedicated worker thread
///
/// Handlers run one at a time, in global publish order across all
/// subscribers. `publish` only enqueues. Because there is a single worker, a
/// handler that never returns stalls every later delivery.
pub struct EventLoopMessageBus {
    core: Arc<BusCore<()>>,
    sender: RwLock<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EventLoopMessageBus {
    /// Create a new event-loop bus with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(&BusConfig::for_strategy(Strategy::EventLoop))
    }

    /// Create a new event-loop bus, naming its worker after
    /// `config.thread_name`
    pub fn with_config(config: &BusConfig) -> Result<Self> {
        let core = BusCore::new(Strategy::EventLoop);
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let name = format!("{}-event-loop", config.thread_name);
        let worker_core = Arc::clone(&core);
        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                tracing::debug!("Event loop started");
                while let Some(job) = receiver.blocking_recv() {
                    for subscription in job.targets.iter() {
                        worker_core.invoke(subscription, &job.envelope);
                    }
                }
                tracing::debug!("Event loop stopped");
            })
            .map_err(|source| MessagingError::WorkerSpawn { name, source })?;

        Ok(Self {
            core,
            sender: RwLock::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }
}

impl MessageBus for EventLoopMessageBus {
    delegate_to_core!();

    fn publish<T: Message>(&self, message: T) -> Result<usize> {
        let Some((envelope, targets)) = self.core.prepare(message)? else {
            return Ok(0);
        };

        let handed = targets.len();
        let sender = self.sender.read();
        let sender = sender.as_ref().ok_or(MessagingError::Disposed)?;
        sender
            .send(Job { envelope, targets })
            .map_err(|_| MessagingError::Disposed)?;
        Ok(handed)
    }

    fn dispose(&self) {
        self.core.dispose();

        // Closing the channel lets the worker drain what is queued (all of it
        // now cancelled) and exit.
        self.sender.write().take();

        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        if worker.thread().id() == thread::current().id() {
            // Disposed from inside a handler; the loop exits on its own.
            return;
        }
        if worker.join().is_err() {
            tracing::error!("Event loop thread terminated abnormally");
        }
    }
}

impl Drop for EventLoopMessageBus {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for EventLoopMessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoopMessageBus")
            .field("core", &self.core)
            .field("running", &self.worker.lock().is_some())
            .finish()
    }
}
