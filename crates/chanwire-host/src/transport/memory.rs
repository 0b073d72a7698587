//! In-process transport: one server endpoint and any number of client peers.
//!
//! Every endpoint owns a bounded inbox. Sinks never wait: a full inbox drops
//! the packet (broadcast copies are dropped per peer).

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use chanwire_core::error::{ChanwireError, Result};
use chanwire_core::{OutboundPacket, PacketSink, Peer, Target};

use super::{InboundPacket, Transport};

/// Receiving half of one endpoint.
pub struct MemoryTransport {
    rx: mpsc::Receiver<InboundPacket>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn recv(&mut self) -> Option<InboundPacket> {
        self.rx.recv().await
    }
}

/// Routing table: server inbox plus `peer -> client inbox`.
pub struct MemoryNetwork {
    server: mpsc::Sender<InboundPacket>,
    clients: DashMap<Peer, mpsc::Sender<InboundPacket>>,
    capacity: usize,
}

fn deliver(tx: &mpsc::Sender<InboundPacket>, packet: InboundPacket) -> Result<()> {
    tx.try_send(packet).map_err(|e| match e {
        TrySendError::Full(_) => ChanwireError::Internal("inbox full".into()),
        TrySendError::Closed(_) => ChanwireError::Internal("inbox closed".into()),
    })
}

impl MemoryNetwork {
    /// Create the network and the server endpoint's transport.
    pub fn new(capacity: usize) -> (Arc<Self>, MemoryTransport) {
        let (tx, rx) = mpsc::channel(capacity);
        let net = Arc::new(Self {
            server: tx,
            clients: DashMap::new(),
            capacity,
        });
        (net, MemoryTransport { rx })
    }

    /// Attach a client peer and return its transport.
    pub fn connect(&self, peer: Peer) -> MemoryTransport {
        let (tx, rx) = mpsc::channel(self.capacity);
        if self.clients.insert(peer.clone(), tx).is_some() {
            tracing::warn!(peer = %peer, "peer reconnected, previous inbox dropped");
        }
        MemoryTransport { rx }
    }

    pub fn disconnect(&self, peer: &Peer) -> bool {
        self.clients.remove(peer).is_some()
    }

    pub fn peers(&self) -> Vec<Peer> {
        self.clients.iter().map(|e| e.key().clone()).collect()
    }

    /// Sink for the server endpoint (targets: one peer or all peers).
    pub fn server_sink(self: &Arc<Self>) -> Arc<dyn PacketSink> {
        Arc::new(ServerSink {
            net: Arc::clone(self),
        })
    }

    /// Sink for one client endpoint (target: the server).
    pub fn client_sink(self: &Arc<Self>, peer: Peer) -> Arc<dyn PacketSink> {
        Arc::new(ClientSink {
            net: Arc::clone(self),
            peer,
        })
    }
}

struct ServerSink {
    net: Arc<MemoryNetwork>,
}

impl PacketSink for ServerSink {
    fn send(&self, packet: OutboundPacket) -> Result<()> {
        let OutboundPacket {
            channel,
            target,
            payload,
        } = packet;
        let inbound = |payload| InboundPacket {
            channel: Arc::clone(&channel),
            from: None,
            payload,
        };

        match target {
            Target::Peer(peer) => {
                let tx = self
                    .net
                    .clients
                    .get(&peer)
                    .map(|e| e.value().clone())
                    .ok_or_else(|| {
                        ChanwireError::Internal(format!("peer {peer} not connected"))
                    })?;
                deliver(&tx, inbound(payload))
            }
            Target::AllPeers => {
                for e in self.net.clients.iter() {
                    if let Err(err) = deliver(e.value(), inbound(payload.clone())) {
                        tracing::warn!(peer = %e.key(), error = %err, "broadcast copy dropped");
                    }
                }
                Ok(())
            }
            Target::Server => Err(ChanwireError::Internal(
                "server endpoint cannot send to the server".into(),
            )),
        }
    }
}

struct ClientSink {
    net: Arc<MemoryNetwork>,
    peer: Peer,
}

impl PacketSink for ClientSink {
    fn send(&self, packet: OutboundPacket) -> Result<()> {
        match packet.target {
            Target::Server => deliver(
                &self.net.server,
                InboundPacket {
                    channel: packet.channel,
                    from: Some(self.peer.clone()),
                    payload: packet.payload,
                },
            ),
            Target::Peer(_) | Target::AllPeers => Err(ChanwireError::Internal(
                "client endpoint can only send to the server".into(),
            )),
        }
    }
}
