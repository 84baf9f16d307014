//! # Message Bus Strategies
//!
//! Every strategy implements [`MessageBus`] and shares the same registry and
//! exact-type routing. They differ only in how handler invocations are
//! scheduled:
//!
//! | Strategy | Scheduling | `publish` returns |
//! |----------|------------|-------------------|
//! | [`InlineMessageBus`] | publisher thread, in subscription order | after every handler ran |
//! | [`EventLoopMessageBus`] | one background thread, global publish order | immediately |
//! | [`ParallelMessageBus`] | worker pool, FIFO mailbox per subscriber | immediately |
//! | [`DataParallelMessageBus`] | `rayon` fan-out across subscribers | after every handler ran |
//! | [`TaskMessageBus`] | one chained tokio task per subscriber and message | immediately |
//!
//! Whatever the strategy, a subscriber sees messages from one publisher in
//! the order they were published, never sees a message of another type, and
//! a panicking handler affects nobody but itself.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rampage_messaging::{InlineMessageBus, Message, MessageBus};
//!
//! #[derive(Debug)]
//! struct JobFinished { id: u64 }
//! impl Message for JobFinished {}
//!
//! let bus = InlineMessageBus::new();
//! let subscription = bus.subscribe(|job: &JobFinished| {
//!     println!("job {} finished", job.id);
//! })?;
//!
//! bus.publish(JobFinished { id: 7 })?;
//!
//! // Unsubscribe when done
//! subscription.unsubscribe();
//! ```

mod any;
mod data_parallel;
mod event_loop;
mod inline;
mod parallel;
mod task;

pub use any::AnyMessageBus;
pub use data_parallel::DataParallelMessageBus;
pub use event_loop::EventLoopMessageBus;
pub use inline::InlineMessageBus;
pub use parallel::ParallelMessageBus;
pub use task::{Delivery, TaskMessageBus};

use crate::config::Strategy;
use crate::error::Result;
use crate::message::Message;
use crate::stats::BusStats;
use crate::subscription::{SubscriptionId, Unsubscribe};

/// Typed publish/subscribe contract shared by all strategies
pub trait MessageBus: Send + Sync {
    /// Register `handler` for messages of exactly type `T`
    ///
    /// The returned handle cancels the subscription. Fails only once the bus
    /// has been disposed.
    fn subscribe<T, F>(&self, handler: F) -> Result<Unsubscribe>
    where
        T: Message,
        F: Fn(&T) + Send + Sync + 'static;

    /// Publish a message to every live subscriber of its exact type
    ///
    /// Returns the number of subscriptions the message was handed to. Handler
    /// panics are contained and never reported here.
    fn publish<T: Message>(&self, message: T) -> Result<usize>;

    /// Publish several messages of one type, in iteration order
    fn publish_all<T, I>(&self, messages: I) -> Result<usize>
    where
        T: Message,
        I: IntoIterator<Item = T>,
    {
        let mut handed = 0;
        for message in messages {
            handed += self.publish(message)?;
        }
        Ok(handed)
    }

    /// Cancel a subscription by token
    ///
    /// Returns true if the subscription was found and removed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Release background resources and cancel every subscription
    fn dispose(&self);

    /// Whether [`MessageBus::dispose`] has been called
    fn is_disposed(&self) -> bool;

    /// Get the number of active subscriptions
    fn subscriber_count(&self) -> usize;

    /// Delivery counters
    fn stats(&self) -> BusStats;

    /// Scheduling strategy of this bus
    fn strategy(&self) -> Strategy;
}

/// Implements the [`MessageBus`] methods that only touch the shared core.
macro_rules! delegate_to_core {
    () => {
        fn subscribe<T, F>(&self, handler: F) -> $crate::error::Result<$crate::Unsubscribe>
        where
            T: $crate::Message,
            F: Fn(&T) + Send + Sync + 'static,
        {
            self.core.subscribe::<T, F>(handler)
        }

        fn unsubscribe(&self, id: $crate::SubscriptionId) -> bool {
            self.core.unsubscribe(id)
        }

        fn is_disposed(&self) -> bool {
            self.core.is_disposed()
        }

        fn subscriber_count(&self) -> usize {
            self.core.subscriber_count()
        }

        fn stats(&self) -> $crate::BusStats {
            self.core.stats()
        }

        fn strategy(&self) -> $crate::Strategy {
            self.core.strategy()
        }
    };
}

pub(crate) use delegate_to_core;
