//! Message instantiation.

use std::any::type_name;
use std::sync::Arc;

use crate::context::ChannelContext;
use crate::error::{ChanwireError, Result};
use crate::message::Message;

/// Cached constructor for one message type, resolved at registration.
pub struct Instantiator<M> {
    ctor: fn(Arc<ChannelContext>) -> Result<M>,
}

impl<M: Message> Instantiator<M> {
    pub fn resolve() -> Self {
        Self {
            ctor: M::instantiate,
        }
    }

    /// Build an empty instance; any failure becomes `BadMessage`.
    pub fn instantiate(&self, channel: Arc<ChannelContext>) -> Result<M> {
        (self.ctor)(channel).map_err(|e| {
            ChanwireError::BadMessage(format!(
                "cannot instantiate message type {}: {e}",
                type_name::<M>()
            ))
        })
    }
}
