//! Strategy chosen at construction time from configuration.

use super::{
    DataParallelMessageBus, EventLoopMessageBus, InlineMessageBus, MessageBus,
    ParallelMessageBus, TaskMessageBus,
};
use crate::config::{BusConfig, Strategy};
use crate::error::Result;
use crate::message::Message;
use crate::stats::BusStats;
use crate::subscription::{SubscriptionId, Unsubscribe};

/// Any of the bus strategies, selected by [`BusConfig::strategy`]
#[derive(Debug)]
pub enum AnyMessageBus {
    /// See [`InlineMessageBus`].
    Inline(InlineMessageBus),
    /// See [`EventLoopMessageBus`].
    EventLoop(EventLoopMessageBus),
    /// See [`ParallelMessageBus`].
    Parallel(ParallelMessageBus),
    /// See [`DataParallelMessageBus`].
    DataParallel(DataParallelMessageBus),
    /// See [`TaskMessageBus`].
    Task(TaskMessageBus),
}

impl AnyMessageBus {
    /// Build the bus described by `config`
    pub fn from_config(config: &BusConfig) -> Result<Self> {
        config.validate()?;
        tracing::debug!("Creating {} message bus", config.strategy);

        Ok(match config.strategy {
            Strategy::Inline => Self::Inline(InlineMessageBus::new()),
            Strategy::EventLoop => Self::EventLoop(EventLoopMessageBus::with_config(config)?),
            Strategy::Parallel => Self::Parallel(ParallelMessageBus::with_config(config)?),
            Strategy::DataParallel => {
                Self::DataParallel(DataParallelMessageBus::with_config(config)?)
            }
            Strategy::Task => Self::Task(TaskMessageBus::with_config(config)?),
        })
    }

    /// Build a bus for `strategy` with otherwise default settings
    pub fn for_strategy(strategy: Strategy) -> Result<Self> {
        Self::from_config(&BusConfig::for_strategy(strategy))
    }
}

macro_rules! each_strategy {
    ($self:expr, $bus:ident => $body:expr) => {
        match $self {
            AnyMessageBus::Inline($bus) => $body,
            AnyMessageBus::EventLoop($bus) => $body,
            AnyMessageBus::Parallel($bus) => $body,
            AnyMessageBus::DataParallel($bus) => $body,
            AnyMessageBus::Task($bus) => $body,
        }
    };
}

impl MessageBus for AnyMessageBus {
    fn subscribe<T, F>(&self, handler: F) -> Result<Unsubscribe>
    where
        T: Message,
        F: Fn(&T) + Send + Sync + 'static,
    {
        each_strategy!(self, bus => bus.subscribe::<T, F>(handler))
    }

    fn publish<T: Message>(&self, message: T) -> Result<usize> {
        each_strategy!(self, bus => bus.publish(message))
    }

    fn publish_all<T, I>(&self, messages: I) -> Result<usize>
    where
        T: Message,
        I: IntoIterator<Item = T>,
    {
        each_strategy!(self, bus => bus.publish_all(messages))
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        each_strategy!(self, bus => bus.unsubscribe(id))
    }

    fn dispose(&self) {
        each_strategy!(self, bus => bus.dispose())
    }

    fn is_disposed(&self) -> bool {
        each_strategy!(self, bus => bus.is_disposed())
    }

    fn subscriber_count(&self) -> usize {
        each_strategy!(self, bus => bus.subscriber_count())
    }

    fn stats(&self) -> BusStats {
        each_strategy!(self, bus => bus.stats())
    }

    fn strategy(&self) -> Strategy {
        each_strategy!(self, bus => bus.strategy())
    }
}
