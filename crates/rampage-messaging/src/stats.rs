//! Delivery counters exposed as a side channel.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::subscription::Invocation;

/// Point-in-time view of a bus's delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    /// Messages accepted by `publish`.
    pub published: u64,
    /// Handler invocations that returned normally.
    pub delivered: u64,
    /// Deliveries dropped because the subscription was cancelled first.
    pub skipped: u64,
    /// Handler invocations that panicked.
    pub faulted: u64,
    /// Live subscriptions at the time of the snapshot.
    pub subscribers: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    skipped: AtomicU64,
    faulted: AtomicU64,
}

impl Counters {
    pub(crate) fn record_publish(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, outcome: Invocation) {
        let counter = match outcome {
            Invocation::Delivered => &self.delivered,
            Invocation::Skipped => &self.skipped,
            Invocation::Faulted => &self.faulted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, subscribers: usize) -> BusStats {
        BusStats {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            faulted: self.faulted.load(Ordering::Relaxed),
            subscribers,
        }
    }
}
