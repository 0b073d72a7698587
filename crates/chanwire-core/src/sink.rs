//! Outbound boundary towards the transport.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;
use crate::message::{Peer, Side};

/// Where an outbound packet goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Client -> server.
    Server,
    /// Server -> one client session.
    Peer(Peer),
    /// Server -> every connected client session.
    AllPeers,
}

impl Target {
    /// Side that receives a packet sent to this target.
    pub fn receiving_side(&self) -> Side {
        match self {
            Target::Server => Side::Server,
            Target::Peer(_) | Target::AllPeers => Side::Client,
        }
    }
}

/// An encoded packet plus its destination channel.
#[derive(Debug, Clone)]
pub struct OutboundPacket {
    pub channel: Arc<str>,
    pub target: Target,
    pub payload: Bytes,
}

/// Accepts encoded packets. Implemented by the transport layer.
pub trait PacketSink: Send + Sync {
    fn send(&self, packet: OutboundPacket) -> Result<()>;
}
