//! chanwire host demo.
//!
//! Loads the channel config, runs a server hub and a client hub over the
//! in-process transport, and performs the `Greeting` / `Welcome` handshake
//! on the first configured channel.

use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use chanwire_core::error::{ChanwireError, Result};
use chanwire_core::{Message, Peer, Target};
use chanwire_host::config::{self, SideConfig};
use chanwire_host::demo::{self, Greeting, Welcome};
use chanwire_host::hub::ChannelHub;
use chanwire_host::transport::{run_endpoint, MemoryNetwork};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run().await {
        tracing::error!(code = e.code().as_str(), error = %e, "chanwire-host failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "chanwire.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    tracing::info!(%path, channels = cfg.channels.len(), "config loaded");

    let mut server_cfg = cfg.clone();
    server_cfg.endpoint.side = SideConfig::Server;
    let mut client_cfg = cfg.clone();
    client_cfg.endpoint.side = SideConfig::Client;

    let (server, server_main) = ChannelHub::new(server_cfg)?;
    let (client, mut client_main) = ChannelHub::new(client_cfg)?;

    for ctx in server.channels() {
        demo::register(&ctx)?;
        demo::serve_greetings(&ctx, format!("welcome to #{}", ctx.name()));
    }
    for ctx in client.channels() {
        demo::register(&ctx)?;
        ctx.on::<Welcome, _>(|w, _| {
            tracing::info!(
                channel = w.channel().name(),
                motd = %w.motd,
                players = w.player_count,
                operator = w.operator,
                "welcomed"
            );
            Ok(())
        });
    }

    let (net, server_inbox) = MemoryNetwork::new(cfg.endpoint.queue_capacity);
    let peer = Peer::new("demo-client");
    let client_inbox = net.connect(peer.clone());
    server.attach_sink(net.server_sink());
    client.attach_sink(net.client_sink(peer));

    tokio::spawn(run_endpoint(server.clone(), server_inbox));
    tokio::spawn(run_endpoint(client.clone(), client_inbox));
    tokio::spawn(server_main.run());

    let first = cfg
        .channels
        .first()
        .map(|c| c.name.clone())
        .ok_or_else(|| ChanwireError::Config("channels must not be empty".into()))?;
    let ctx = client
        .channel(&first)
        .ok_or_else(|| ChanwireError::InvalidChannel(first.clone()))?;

    let mut hello = Greeting::instantiate(ctx.clone())?;
    hello.name = "demo".into();
    ctx.send(&hello, Target::Server)?;

    match tokio::time::timeout(Duration::from_secs(2), client_main.run_next()).await {
        Ok(true) => {}
        Ok(false) => return Err(ChanwireError::Internal("client main thread closed".into())),
        Err(_) => return Err(ChanwireError::Internal("no welcome within 2s".into())),
    }

    tracing::info!("server metrics\n{}", server.metrics().render());
    tracing::info!("client metrics\n{}", client.metrics().render());
    Ok(())
}
