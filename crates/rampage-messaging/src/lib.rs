//! # Rampage Messaging
//!
//! In-process typed publish/subscribe. Publishers hand a message to the bus
//! and every handler subscribed to exactly that message type receives it.
//! Five interchangeable scheduling strategies share one contract; see
//! [`bus`] for how they differ.

pub mod bus;
pub mod config;
pub mod error;
pub mod message;
pub mod registry;
mod shared;
pub mod stats;
pub mod subscription;

pub use bus::{
    AnyMessageBus, DataParallelMessageBus, Delivery, EventLoopMessageBus, InlineMessageBus,
    MessageBus, ParallelMessageBus, TaskMessageBus,
};
pub use config::{BusConfig, Strategy};
pub use error::{ConfigError, ConfigResult, MessagingError, Result};
pub use message::{Envelope, Message};
pub use stats::BusStats;
pub use subscription::{Subscription, SubscriptionId, Unsubscribe};
