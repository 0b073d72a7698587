//! chanwire core: typed, channel-multiplexed binary message protocol.
//!
//! This crate defines the wire format, the field binding tables, and the
//! per-channel registry that encodes typed messages into framed payloads and
//! decodes them back for side-checked dispatch. It carries no transport or
//! runtime dependencies; the host crate plugs it into a transport.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here.
//! Malformed packets surface as `ChanwireError` values scoped to that packet,
//! so a hostile peer cannot take a channel down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod context;
pub mod error;
pub mod instantiate;
pub mod message;
pub mod protocol;
pub mod schema;
pub mod sink;

pub use context::{ChannelContext, FieldInfo, MessageDescriptor};
/// Shared result type.
pub use error::{ChanwireError, ErrorCode, Result};
pub use message::{Message, Peer, Recipient, Side};
pub use schema::{FieldList, Schema};
pub use sink::{OutboundPacket, PacketSink, Target};
