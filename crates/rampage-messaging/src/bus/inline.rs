//! Synchronous strategy: handlers run on the publisher's thread.

use std::sync::Arc;

use super::{delegate_to_core, MessageBus};
use crate::config::Strategy;
use crate::error::Result;
use crate::message::Message;
use crate::shared::BusCore;

/// Bus that invokes every handler before `publish` returns
///
/// Handlers run sequentially in subscription order. A slow or hung handler
/// blocks the publisher; use another strategy when that matters.
#[derive(Debug)]
pub struct InlineMessageBus {
    core: Arc<BusCore<()>>,
}

impl InlineMessageBus {
    /// Create a new inline bus
    pub fn new() -> Self {
        Self {
            core: BusCore::new(Strategy::Inline),
        }
    }
}

impl Default for InlineMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus for InlineMessageBus {
    delegate_to_core!();

    fn publish<T: Message>(&self, message: T) -> Result<usize> {
        let Some((envelope, targets)) = self.core.prepare(message)? else {
            return Ok(0);
        };

        for subscription in targets.iter() {
            self.core.invoke(subscription, &envelope);
        }
        Ok(targets.len())
    }

    fn dispose(&self) {
        self.core.dispose();
    }
}
