//! A small handshake used by the host binary and the loopback tests.
//!
//! The client sends `Greeting`; the server answers the sending peer with
//! `Welcome`. `Greeting` is handled on the receiving task, `Welcome` on the
//! client's main thread.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chanwire_core::error::Result;
use chanwire_core::{ChannelContext, FieldList, Message, Schema, Side, Target};

/// Client hello. Received on the server.
pub struct Greeting {
    channel: Arc<ChannelContext>,
    pub name: String,
    pub protocol: u8,
    pub spectator: bool,
}

impl Message for Greeting {
    fn channel(&self) -> &Arc<ChannelContext> {
        &self.channel
    }

    fn side() -> Side {
        Side::Server
    }

    fn asynchronous() -> bool {
        true
    }

    fn instantiate(channel: Arc<ChannelContext>) -> Result<Self> {
        Ok(Self {
            channel,
            name: String::new(),
            protocol: PROTOCOL_VERSION,
            spectator: false,
        })
    }
}

impl Schema for Greeting {
    fn declare(f: &mut FieldList<Self>) {
        f.field("name", |m: &Self| &m.name, |m| &mut m.name);
        f.field("protocol", |m: &Self| &m.protocol, |m| &mut m.protocol);
        f.field("spectator", |m: &Self| &m.spectator, |m| &mut m.spectator);
    }
}

/// Server reply. Received on the client.
pub struct Welcome {
    channel: Arc<ChannelContext>,
    pub motd: String,
    pub player_count: u32,
    pub operator: bool,
}

impl Message for Welcome {
    fn channel(&self) -> &Arc<ChannelContext> {
        &self.channel
    }

    fn side() -> Side {
        Side::Client
    }

    fn instantiate(channel: Arc<ChannelContext>) -> Result<Self> {
        Ok(Self {
            channel,
            motd: String::new(),
            player_count: 0,
            operator: false,
        })
    }
}

impl Schema for Welcome {
    fn declare(f: &mut FieldList<Self>) {
        f.field("motd", |m: &Self| &m.motd, |m| &mut m.motd);
        f.field("playerCount", |m: &Self| &m.player_count, |m| &mut m.player_count)
            .marshalled_as("varint");
        f.field("operator", |m: &Self| &m.operator, |m| &mut m.operator);
    }
}

pub const PROTOCOL_VERSION: u8 = 3;

/// Register the handshake types. Both endpoints must call this in the same
/// order so the ids agree.
pub fn register(ctx: &ChannelContext) -> Result<()> {
    ctx.register::<Greeting>()?.register::<Welcome>()?;
    Ok(())
}

/// Server side: answer every `Greeting` with a `Welcome` to its sender.
pub fn serve_greetings(ctx: &ChannelContext, motd: impl Into<String>) {
    let motd: Arc<str> = Arc::from(motd.into());
    let joined = AtomicU32::new(0);
    ctx.on::<Greeting, _>(move |hello, from| {
        let Some(peer) = from.peer() else {
            return Ok(());
        };
        let count = joined.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            peer = %peer,
            name = %hello.name,
            protocol = hello.protocol,
            spectator = hello.spectator,
            "greeting"
        );

        let channel = Arc::clone(hello.channel());
        let mut reply = Welcome::instantiate(Arc::clone(&channel))?;
        reply.motd = motd.to_string();
        reply.player_count = count;
        reply.operator = count == 1 && !hello.spectator;
        channel.send(&reply, Target::Peer(peer.clone()))
    });
}
