//! Data-parallel strategy: fan out across subscribers with `rayon`.

use parking_lot::RwLock;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

use super::{delegate_to_core, MessageBus};
use crate::config::{BusConfig, Strategy};
use crate::error::{MessagingError, Result};
use crate::message::Message;
use crate::shared::BusCore;

/// Bus that invokes the subscribers of a message in parallel
///
/// `publish` returns once every resolved handler has run. Subscribers are
/// spread over the pool; each one processes its messages sequentially, so
/// [`MessageBus::publish_all`] hands a whole batch to each subscriber in
/// order while different subscribers work through it side by side.
///
/// Handlers must not synchronously publish back to their own message type:
/// the nested fan-out may land on another worker and wait on the
/// subscriber's own delivery lock.
pub struct DataParallelMessageBus {
    core: Arc<BusCore<()>>,
    pool: RwLock<Option<Arc<ThreadPool>>>,
}

impl DataParallelMessageBus {
    /// Create a new data-parallel bus with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(&BusConfig::for_strategy(Strategy::DataParallel))
    }

    /// Create a new data-parallel bus with `config.worker_threads` workers
    pub fn with_config(config: &BusConfig) -> Result<Self> {
        let prefix = config.thread_name.clone();
        let threads = config.effective_worker_threads();
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |index| format!("{}-fanout-{}", prefix, index))
            .build()?;
        tracing::debug!("Data-parallel bus started with {} workers", threads);

        Ok(Self {
            core: BusCore::new(Strategy::DataParallel),
            pool: RwLock::new(Some(Arc::new(pool))),
        })
    }

    fn pool(&self) -> Result<Arc<ThreadPool>> {
        self.pool.read().clone().ok_or(MessagingError::Disposed)
    }
}

impl MessageBus for DataParallelMessageBus {
    delegate_to_core!();

    fn publish<T: Message>(&self, message: T) -> Result<usize> {
        let Some((envelope, targets)) = self.core.prepare(message)? else {
            return Ok(0);
        };

        let pool = self.pool()?;
        let core = &self.core;
        pool.install(|| {
            targets
                .as_slice()
                .par_iter()
                .for_each(|subscription| core.invoke(subscription, &envelope));
        });
        Ok(targets.len())
    }

    fn publish_all<T, I>(&self, messages: I) -> Result<usize>
    where
        T: Message,
        I: IntoIterator<Item = T>,
    {
        let (envelopes, targets) = self.core.prepare_batch(messages)?;
        let Some(targets) = targets else {
            return Ok(0);
        };
        if envelopes.is_empty() {
            return Ok(0);
        }

        let pool = self.pool()?;
        let core = &self.core;
        pool.install(|| {
            targets.as_slice().par_iter().for_each(|subscription| {
                for envelope in &envelopes {
                    core.invoke(subscription, envelope);
                }
            });
        });
        Ok(targets.len() * envelopes.len())
    }

    fn dispose(&self) {
        self.core.dispose();
        self.pool.write().take();
    }
}

impl Drop for DataParallelMessageBus {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for DataParallelMessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataParallelMessageBus")
            .field("core", &self.core)
            .field(
                "workers",
                &self.pool.read().as_ref().map(|pool| pool.current_num_threads()),
            )
            .finish()
    }
}
