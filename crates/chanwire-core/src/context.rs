//! Channel context: type registry, codec and dispatch table.
//!
//! Wire format of one packet (no length prefix, framing belongs to the transport):
//!
//! ```text
//! u8        type id (registration order, from 0)
//! [u8; k]   packed boolean bitmap, k = ceil(bools / 8)
//! ...       remaining fields in resolved order, each at its wire width
//! ```
//!
//! Registration is expected to finish before untrusted traffic is decoded:
//! ids are positional, so registering later shifts nothing but does extend
//! what the channel accepts.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use crate::error::{ChanwireError, Result};
use crate::instantiate::Instantiator;
use crate::message::{Message, Recipient, Side};
use crate::protocol::{pack_bools, unpack_bools, WireType};
use crate::schema::{self, Schema, WireField};
use crate::sink::{OutboundPacket, PacketSink, Target};

/// Longest accepted channel name, in characters.
pub const MAX_CHANNEL_NAME_LEN: usize = 20;

/// One-byte id space.
pub const MAX_MESSAGE_TYPES: usize = 256;

/// Public view of one resolved field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: &'static str,
    pub wire: WireType,
}

/// Public view of one registered message type.
#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    pub id: u8,
    pub name: &'static str,
    pub side: Side,
    pub asynchronous: bool,
    /// Resolved field order (the wire format).
    pub fields: Vec<FieldInfo>,
    pub bool_count: usize,
}

trait ErasedCodec: Send + Sync {
    fn encode(&self, msg: &dyn Any, out: &mut BytesMut) -> Result<()>;
    fn decode(
        &self,
        channel: Arc<ChannelContext>,
        side: Side,
        buf: &mut Bytes,
    ) -> Result<Box<dyn Message>>;
}

struct TypedCodec<M> {
    side: Side,
    bools: Vec<WireField<M>>,
    others: Vec<WireField<M>>,
    instantiator: Instantiator<M>,
}

impl<M: Message> ErasedCodec for TypedCodec<M> {
    fn encode(&self, msg: &dyn Any, out: &mut BytesMut) -> Result<()> {
        let msg = msg.downcast_ref::<M>().ok_or_else(|| {
            ChanwireError::Internal(format!("codec mismatch for {}", type_name::<M>()))
        })?;
        let bits: Vec<bool> = self.bools.iter().map(|f| f.get_bool(msg)).collect();
        pack_bools(&bits, out);
        for f in &self.others {
            f.marshal(msg, out)?;
        }
        Ok(())
    }

    fn decode(
        &self,
        channel: Arc<ChannelContext>,
        side: Side,
        buf: &mut Bytes,
    ) -> Result<Box<dyn Message>> {
        let mut msg = self.instantiator.instantiate(channel)?;
        if self.side != side {
            return Err(ChanwireError::WrongSide {
                message: type_name::<M>(),
                expected: self.side,
                actual: side,
            });
        }
        let bits = unpack_bools(self.bools.len(), buf)?;
        for (f, v) in self.bools.iter().zip(bits) {
            f.set_bool(&mut msg, v)?;
        }
        for f in &self.others {
            f.unmarshal(&mut msg, buf)?;
        }
        Ok(Box::new(msg))
    }
}

struct Entry {
    descriptor: MessageDescriptor,
    codec: Arc<dyn ErasedCodec>,
}

/// `TypeId -> id` plus `id -> entry` (the entry index is the id).
#[derive(Default)]
struct Registry {
    ids: HashMap<TypeId, u8>,
    entries: Vec<Entry>,
}

impl Registry {
    fn by_type(&self, type_id: TypeId) -> Option<&Entry> {
        let id = self.ids.get(&type_id)?;
        self.entries.get(usize::from(*id))
    }
}

type Handler = Arc<dyn Fn(Box<dyn Message>, &Recipient) -> Result<()> + Send + Sync>;

/// Root registry for one named channel.
///
/// Created once per channel and shared as `Arc`. `register` takes a write
/// lock; `encode`/`decode`/`dispatch` only read the tables and may run
/// concurrently from any thread.
pub struct ChannelContext {
    name: Arc<str>,
    me: Weak<ChannelContext>,
    registry: RwLock<Registry>,
    handlers: RwLock<HashMap<TypeId, Handler>>,
    sink: RwLock<Option<Arc<dyn PacketSink>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl ChannelContext {
    /// Create the context for `name` (1..=20 characters).
    pub fn for_channel(name: &str) -> Result<Arc<Self>> {
        if name.is_empty() {
            return Err(ChanwireError::InvalidChannel("name must not be empty".into()));
        }
        if name.chars().count() > MAX_CHANNEL_NAME_LEN {
            return Err(ChanwireError::InvalidChannel(format!(
                "`{name}` is longer than {MAX_CHANNEL_NAME_LEN} characters"
            )));
        }
        Ok(Arc::new_cyclic(|me| Self {
            name: Arc::from(name),
            me: me.clone(),
            registry: RwLock::new(Registry::default()),
            handlers: RwLock::new(HashMap::new()),
            sink: RwLock::new(None),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of registered message types.
    pub fn len(&self) -> usize {
        read(&self.registry).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register `M` under the next free id.
    ///
    /// Registering the same type again logs a warning and changes nothing.
    pub fn register<M: Message + Schema>(&self) -> Result<&Self> {
        let type_id = TypeId::of::<M>();
        let name = type_name::<M>();
        let mut reg = write(&self.registry);

        if reg.ids.contains_key(&type_id) {
            warn!(channel = %self.name, message = name, "message type registered twice, ignoring");
            return Ok(self);
        }
        let id = u8::try_from(reg.entries.len()).map_err(|_| {
            ChanwireError::Internal(format!(
                "channel {} already holds {MAX_MESSAGE_TYPES} message types",
                self.name
            ))
        })?;

        let fields = schema::resolve::<M>()?;
        let infos: Vec<FieldInfo> = fields
            .iter()
            .map(|f| FieldInfo {
                name: f.name(),
                wire: f.wire_type(),
            })
            .collect();
        let (bools, others): (Vec<_>, Vec<_>) = fields.into_iter().partition(|f| f.is_bool());

        let descriptor = MessageDescriptor {
            id,
            name,
            side: M::side(),
            asynchronous: M::asynchronous(),
            fields: infos,
            bool_count: bools.len(),
        };
        debug!(
            channel = %self.name,
            message = name,
            id,
            fields = descriptor.fields.len(),
            bools = descriptor.bool_count,
            side = %descriptor.side,
            "registered message type"
        );

        let codec = TypedCodec::<M> {
            side: descriptor.side,
            bools,
            others,
            instantiator: Instantiator::resolve(),
        };
        reg.ids.insert(type_id, id);
        reg.entries.push(Entry {
            descriptor,
            codec: Arc::new(codec),
        });
        Ok(self)
    }

    pub fn id_of<M: Message>(&self) -> Option<u8> {
        read(&self.registry).ids.get(&TypeId::of::<M>()).copied()
    }

    pub fn descriptor<M: Message>(&self) -> Option<MessageDescriptor> {
        read(&self.registry)
            .by_type(TypeId::of::<M>())
            .map(|e| e.descriptor.clone())
    }

    pub fn descriptor_by_id(&self, id: u8) -> Option<MessageDescriptor> {
        read(&self.registry)
            .entries
            .get(usize::from(id))
            .map(|e| e.descriptor.clone())
    }

    /// Descriptor of an instance's type, if registered here.
    pub fn describe(&self, msg: &dyn Message) -> Option<MessageDescriptor> {
        read(&self.registry)
            .by_type(msg.as_any().type_id())
            .map(|e| e.descriptor.clone())
    }

    fn unregistered(&self, msg: &dyn Message) -> ChanwireError {
        ChanwireError::BadMessage(format!(
            "{} is not registered on channel {}",
            msg.type_name(),
            self.name
        ))
    }

    /// Encode `msg` into a fresh buffer ready for transport.
    pub fn encode(&self, msg: &dyn Message) -> Result<Bytes> {
        let (id, codec) = {
            let reg = read(&self.registry);
            let entry = reg
                .by_type(msg.as_any().type_id())
                .ok_or_else(|| self.unregistered(msg))?;
            (entry.descriptor.id, Arc::clone(&entry.codec))
        };

        let mut out = BytesMut::new();
        out.put_u8(id);
        codec.encode(msg.as_any(), &mut out)?;
        Ok(out.freeze())
    }

    /// Decode one packet received on `side`.
    pub fn decode(&self, side: Side, mut payload: Bytes) -> Result<Box<dyn Message>> {
        if !payload.has_remaining() {
            return Err(ChanwireError::Malformed("empty packet".into()));
        }
        let id = payload.get_u8();
        let codec = read(&self.registry)
            .entries
            .get(usize::from(id))
            .map(|e| Arc::clone(&e.codec))
            .ok_or_else(|| ChanwireError::UnknownPacket {
                channel: self.name.to_string(),
                id,
            })?;
        let channel = self
            .me
            .upgrade()
            .ok_or_else(|| ChanwireError::Internal("channel context dropped".into()))?;

        let msg = match codec.decode(channel, side, &mut payload) {
            Ok(msg) => msg,
            Err(e) => {
                if let ChanwireError::WrongSide {
                    message,
                    expected,
                    actual,
                } = &e
                {
                    warn!(
                        channel = %self.name,
                        message = *message,
                        expected = %expected,
                        actual = %actual,
                        "packet received on wrong side, possible protocol violation"
                    );
                }
                return Err(e);
            }
        };
        if payload.has_remaining() {
            return Err(ChanwireError::Malformed(format!(
                "{} trailing bytes after {}",
                payload.remaining(),
                msg.type_name()
            )));
        }
        Ok(msg)
    }

    /// Register the handler invoked by `dispatch` for `M`. Replaces any previous one.
    pub fn on<M, F>(&self, handler: F) -> &Self
    where
        M: Message,
        F: Fn(M, &Recipient) -> Result<()> + Send + Sync + 'static,
    {
        let wrapped: Handler = Arc::new(move |msg: Box<dyn Message>, to: &Recipient| {
            let msg = msg.downcast::<M>().ok_or_else(|| {
                ChanwireError::Internal(format!("handler mismatch for {}", type_name::<M>()))
            })?;
            handler(msg, to)
        });
        if write(&self.handlers)
            .insert(TypeId::of::<M>(), wrapped)
            .is_some()
        {
            debug!(channel = %self.name, message = type_name::<M>(), "handler replaced");
        }
        self
    }

    /// Hand a decoded message to its type's handler.
    pub fn dispatch(&self, msg: Box<dyn Message>, recipient: &Recipient) -> Result<()> {
        let type_id = (*msg).as_any().type_id();
        let side = read(&self.registry)
            .by_type(type_id)
            .map(|e| e.descriptor.side)
            .ok_or_else(|| self.unregistered(&*msg))?;
        if recipient.side() != side {
            return Err(ChanwireError::WrongSide {
                message: msg.type_name(),
                expected: side,
                actual: recipient.side(),
            });
        }

        let handler = read(&self.handlers).get(&type_id).cloned();
        let Some(handler) = handler else {
            warn!(channel = %self.name, message = msg.type_name(), "no handler registered");
            return Err(ChanwireError::BadMessage(format!(
                "no handler for {} on channel {}",
                msg.type_name(),
                self.name
            )));
        };
        debug!(channel = %self.name, message = msg.type_name(), "dispatching");
        handler(msg, recipient)
    }

    /// Decode on the recipient's side, then dispatch.
    pub fn receive(&self, payload: Bytes, recipient: &Recipient) -> Result<()> {
        let msg = self.decode(recipient.side(), payload)?;
        self.dispatch(msg, recipient)
    }

    /// Attach the transport-side sink used by `send`.
    pub fn attach_sink(&self, sink: Arc<dyn PacketSink>) {
        *write(&self.sink) = Some(sink);
    }

    /// Encode `msg` and hand it to the attached sink.
    ///
    /// `Target::Server` needs a server-received type; peer targets need a
    /// client-received type.
    pub fn send(&self, msg: &dyn Message, target: Target) -> Result<()> {
        let side = self
            .describe(msg)
            .map(|d| d.side)
            .ok_or_else(|| self.unregistered(msg))?;
        if target.receiving_side() != side {
            return Err(ChanwireError::WrongSide {
                message: msg.type_name(),
                expected: side,
                actual: target.receiving_side(),
            });
        }
        let sink = read(&self.sink).clone().ok_or_else(|| {
            ChanwireError::Internal(format!("no sink attached to channel {}", self.name))
        })?;
        let payload = self.encode(msg)?;
        sink.send(OutboundPacket {
            channel: Arc::clone(&self.name),
            target,
            payload,
        })
    }
}

impl fmt::Debug for ChannelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelContext")
            .field("name", &self.name)
            .field("types", &self.len())
            .finish()
    }
}
