//! Message traits and sides.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::context::ChannelContext;
use crate::error::Result;

/// The role a message is received on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Client,
    Server,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Server => "server",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upcast helper so `dyn Message` can be downcast to its concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Any + Send> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// A typed message carried on one channel.
///
/// Implementors also implement [`crate::schema::Schema`] to declare their
/// wire layout; both are required by [`ChannelContext::register`].
pub trait Message: AsAny + Send + Sync + 'static {
    /// The channel this instance belongs to.
    fn channel(&self) -> &Arc<ChannelContext>;

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Side this type is received on.
    fn side() -> Side
    where
        Self: Sized;

    /// Handled directly on the receiving thread instead of the host's main queue.
    fn asynchronous() -> bool
    where
        Self: Sized,
    {
        false
    }

    /// Build an empty instance bound to `channel`; fields are filled in by decode.
    fn instantiate(channel: Arc<ChannelContext>) -> Result<Self>
    where
        Self: Sized;
}

impl dyn Message {
    pub fn is<M: Message>(&self) -> bool {
        self.as_any().is::<M>()
    }

    pub fn downcast_ref<M: Message>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }

    /// Take ownership of the concrete message.
    pub fn downcast<M: Message>(self: Box<Self>) -> Option<M> {
        self.into_any().downcast::<M>().ok().map(|m| *m)
    }
}

impl fmt::Debug for dyn Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("type", &self.type_name())
            .field("channel", &self.channel().name())
            .finish()
    }
}

/// Remote session a server-side message arrived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Peer {
    id: Arc<str>,
}

impl Peer {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Who a decoded message is handed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Client side: no sender context.
    Client,
    /// Server side: the session that sent the packet.
    Server(Peer),
}

impl Recipient {
    pub fn side(&self) -> Side {
        match self {
            Recipient::Client => Side::Client,
            Recipient::Server(_) => Side::Server,
        }
    }

    pub fn peer(&self) -> Option<&Peer> {
        match self {
            Recipient::Client => None,
            Recipient::Server(p) => Some(p),
        }
    }
}
