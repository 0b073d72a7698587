//! Transport boundary.
//!
//! The core only sees framed payloads: a transport yields one
//! `InboundPacket` per received message and accepts encoded packets through
//! `chanwire_core::PacketSink`.

pub mod endpoint;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use chanwire_core::Peer;

/// One framed payload as delivered by the transport.
#[derive(Debug, Clone)]
pub struct InboundPacket {
    pub channel: Arc<str>,
    /// Sending session; present for packets received on the server.
    pub from: Option<Peer>,
    pub payload: Bytes,
}

/// Source of inbound packets.
#[async_trait]
pub trait Transport: Send {
    /// Next packet, or `None` once the transport is closed.
    async fn recv(&mut self) -> Option<InboundPacket>;
}

pub use endpoint::run_endpoint;
pub use memory::{MemoryNetwork, MemoryTransport};
